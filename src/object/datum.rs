use std::fmt;

/// A store-independent S-expression.
///
/// Hosts without a reader describe programs as a `Datum` tree and hand it to
/// [`Machine::alloc_datum`](crate::Machine::alloc_datum), which builds the matching value graph.
/// [`Machine::to_datum`](crate::Machine::to_datum) goes the other way.
#[derive(Clone, Debug, PartialEq)]
pub enum Datum {
    Number(f64),
    Symbol(String),
    List(Vec<Datum>),
}

impl Datum {
    pub fn sym(name: &str) -> Self {
        Datum::Symbol(name.to_owned())
    }

    pub fn list(items: Vec<Datum>) -> Self {
        Datum::List(items)
    }

    pub fn nil() -> Self {
        Datum::List(Vec::new())
    }
}

/// Format a number with six significant digits, switching to exponent form below `1e-4` and
/// from `1e6` up, the way C's `%g` does: `1e+06`, `0.0001`, `4.5`.
pub fn format_number(x: f64) -> String {
    if !x.is_finite() {
        return x.to_string();
    }
    // Rounding to six digits first decides which form applies, e.g. 999999.5 becomes 1e+06.
    let sci = format!("{:.5e}", x);
    let (mantissa, exp) = match sci.split_once('e').map(|(m, e)| (m, e.parse::<i32>())) {
        Some((mantissa, Ok(exp))) => (mantissa, exp),
        _ => return x.to_string(),
    };
    if exp < -4 || exp >= 6 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_zeros(mantissa), sign, exp.abs())
    } else {
        trim_zeros(&format!("{:.*}", (5 - exp) as usize, x)).to_owned()
    }
}

fn trim_zeros(digits: &str) -> &str {
    if digits.contains('.') {
        digits.trim_end_matches('0').trim_end_matches('.')
    } else {
        digits
    }
}

impl From<f64> for Datum {
    fn from(x: f64) -> Self {
        Datum::Number(x)
    }
}

impl From<&str> for Datum {
    fn from(name: &str) -> Self {
        Datum::sym(name)
    }
}

impl From<Vec<Datum>> for Datum {
    fn from(items: Vec<Datum>) -> Self {
        Datum::List(items)
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Datum::Number(x) => write!(f, "{}", format_number(*x)),
            Datum::Symbol(name) => write!(f, "{}", name),
            Datum::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            },
        }
    }
}
