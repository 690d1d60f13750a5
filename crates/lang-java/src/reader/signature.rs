//! Class type references of descriptors and generic signatures.
//!
//! Accepts field/method descriptors as well as class, method and field signatures, since
//! all of them are sequences of Java type signatures around optional type parameters,
//! a parameter list and throws clauses.

pub(crate) fn referenced_types(signature: &str) -> Result<Vec<String>, String> {
    let mut parser = SignatureParser {
        input: signature.as_bytes(),
        pos: 0,
        types: Vec::new(),
    };
    parser.parse()?;
    Ok(parser.types)
}

struct SignatureParser<'a> {
    input: &'a [u8],
    pos: usize,
    types: Vec<String>,
}

impl SignatureParser<'_> {
    fn parse(&mut self) -> Result<(), String> {
        if self.peek() == Some(b'<') {
            self.type_parameters()?;
        }
        while let Some(c) = self.peek() {
            match c {
                b'(' => {
                    self.pos += 1;
                    while self.peek() != Some(b')') {
                        self.java_type()?;
                    }
                    self.pos += 1;
                }
                b'^' => {
                    self.pos += 1;
                    self.java_type()?;
                }
                _ => self.java_type()?,
            }
        }
        Ok(())
    }

    fn type_parameters(&mut self) -> Result<(), String> {
        self.expect(b'<')?;
        while self.peek() != Some(b'>') {
            self.identifier(&[b':'])?;
            self.expect(b':')?;
            // Class bound may be empty when only interface bounds follow.
            if !matches!(self.peek(), Some(b':') | Some(b'>')) {
                self.java_type()?;
            }
            while self.peek() == Some(b':') {
                self.pos += 1;
                self.java_type()?;
            }
        }
        self.expect(b'>')
    }

    fn java_type(&mut self) -> Result<(), String> {
        match self.peek() {
            Some(b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b'V') => {
                self.pos += 1;
                Ok(())
            }
            Some(b'[') => {
                self.pos += 1;
                self.java_type()
            }
            Some(b'T') => {
                self.pos += 1;
                self.identifier(&[b';'])?;
                self.expect(b';')
            }
            Some(b'L') => self.class_type(),
            Some(c) => Err(self.error(&format!("unexpected '{}'", c as char))),
            None => Err(self.error("unexpected end")),
        }
    }

    fn class_type(&mut self) -> Result<(), String> {
        self.expect(b'L')?;
        let mut name = self.identifier(&[b'<', b'.', b';'])?;
        if self.peek() == Some(b'<') {
            self.type_arguments()?;
        }
        while self.peek() == Some(b'.') {
            self.pos += 1;
            let inner = self.identifier(&[b'<', b'.', b';'])?;
            name = format!("{name}${inner}");
            if self.peek() == Some(b'<') {
                self.type_arguments()?;
            }
        }
        self.expect(b';')?;
        self.types.push(name);
        Ok(())
    }

    fn type_arguments(&mut self) -> Result<(), String> {
        self.expect(b'<')?;
        while self.peek() != Some(b'>') {
            match self.peek() {
                Some(b'*') => self.pos += 1,
                Some(b'+' | b'-') => {
                    self.pos += 1;
                    self.java_type()?;
                }
                Some(_) => self.java_type()?,
                None => return Err(self.error("unterminated type arguments")),
            }
        }
        self.expect(b'>')
    }

    fn identifier(&mut self, terminators: &[u8]) -> Result<String, String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if terminators.contains(&c) {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start || self.peek().is_none() {
            return Err(self.error("bad identifier"));
        }
        Ok(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
    }

    fn expect(&mut self, expected: u8) -> Result<(), String> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", expected as char)))
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn error(&self, what: &str) -> String {
        format!(
            "{} at {} in signature {}",
            what,
            self.pos,
            String::from_utf8_lossy(self.input)
        )
    }
}
