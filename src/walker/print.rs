use crate::{
    object::{format_number, Datum, Function, Value, ValueRef},
    util::ensure_sufficient_stack,
    Error,
};
use super::Machine;

impl Machine {
    /// Render a value in Lisp notation, e.g. `(1 (2 3) foo)`.
    pub fn display(&self, value: ValueRef) -> Result<String, Error> {
        let mut out = String::new();
        self.write_value(&mut out, value)?;
        Ok(out)
    }

    fn write_value(&self, out: &mut String, value: ValueRef) -> Result<(), Error> {
        match self.get(value)? {
            Value::Number(x) => out.push_str(&format_number(*x)),
            Value::Symbol(name) => out.push_str(name.as_str()),
            Value::Function(Function::Builtin(builtin)) => {
                out.push_str("<builtin ");
                out.push_str(builtin.name.as_str());
                out.push('>');
            },
            Value::Function(Function::Closure(_)) => out.push_str("<lambda>"),
            Value::List(head) => {
                out.push('(');
                for (i, item) in self.cells(*head)?.into_iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    ensure_sufficient_stack(|| self.write_value(out, item))?;
                }
                out.push(')');
            },
        }
        Ok(())
    }

    /// Structural equality: numbers by value, symbols by name, lists element by element and
    /// functions by identity.
    pub fn equal(&self, a: ValueRef, b: ValueRef) -> Result<bool, Error> {
        Ok(match (self.get(a)?, self.get(b)?) {
            (Value::Number(x), Value::Number(y)) => x == y,
            (Value::Symbol(x), Value::Symbol(y)) => x == y,
            (Value::Function(_), Value::Function(_)) => a == b,
            (Value::List(x), Value::List(y)) => {
                let (xs, ys) = (self.cells(*x)?, self.cells(*y)?);
                if xs.len() != ys.len() {
                    return Ok(false);
                }
                for (x, y) in xs.into_iter().zip(ys) {
                    if !ensure_sufficient_stack(|| self.equal(x, y))? {
                        return Ok(false);
                    }
                }
                true
            },
            _ => false,
        })
    }

    /// Build the value graph described by `datum`.
    pub fn alloc_datum(&mut self, datum: &Datum) -> Result<ValueRef, Error> {
        match datum {
            Datum::Number(x) => self.make_number(*x),
            Datum::Symbol(name) => self.make_symbol(name.as_str()),
            Datum::List(items) => {
                let items = items
                    .iter()
                    .map(|item| ensure_sufficient_stack(|| self.alloc_datum(item)))
                    .collect::<Result<Vec<_>, _>>()?;
                self.list_from(&items)
            },
        }
    }

    /// Read a value graph back as a [`Datum`]. Functions have no datum form.
    pub fn to_datum(&self, value: ValueRef) -> Result<Datum, Error> {
        match self.get(value)? {
            Value::Number(x) => Ok(Datum::Number(*x)),
            Value::Symbol(name) => Ok(Datum::sym(name.as_str())),
            Value::List(head) => self
                .cells(*head)?
                .into_iter()
                .map(|item| ensure_sufficient_stack(|| self.to_datum(item)))
                .collect::<Result<Vec<_>, _>>()
                .map(Datum::List),
            Value::Function(_) => Err(Error::type_mismatch("datum", "function")),
        }
    }
}
