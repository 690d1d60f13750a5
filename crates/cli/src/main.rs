fn main() {
    std::process::exit(abiscope_cli::run());
}
