use std::fmt;
use internment::Intern;

/// An interned symbol name.
///
/// Two symbols are equal exactly when their names are equal, so comparing them is a pointer
/// comparison rather than a string comparison.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Symbol(Intern<String>);

impl Symbol {
    pub fn new(name: &str) -> Self {
        Self(Intern::new(name.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "'{}", self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_names_are_equal_symbols() {
        let a = Symbol::new("lambda");
        let name = String::from("lam") + "bda";
        let b = Symbol::from(name.as_str());
        assert_eq!(a, b);
        assert_ne!(a, Symbol::new("define"));
        assert_eq!(a.to_string(), "lambda");
    }
}
