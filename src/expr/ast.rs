use itertools::Itertools;
use std::fmt;

#[derive(Debug, PartialEq, Clone)]
pub enum Atom {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Keyword(String),
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expr {
    Symbol(String),
    Constant(Atom),
    Application(Box<Expr>, Vec<Expr>),
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
}

impl Expr {
    pub fn sym(name: impl Into<String>) -> Self {
        Expr::Symbol(name.into())
    }

    pub fn keyword(name: impl Into<String>) -> Self {
        Expr::Constant(Atom::Keyword(name.into()))
    }

    pub fn apply(head: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Application(Box::new(Expr::sym(head)), args)
    }

    /// `(get obj :name)`
    pub fn get(obj: Expr, name: impl Into<String>) -> Self {
        Expr::apply("get", vec![obj, Expr::keyword(name)])
    }

    /// `(each var collection body)`
    pub fn each(var: impl Into<String>, collection: Expr, body: Expr) -> Self {
        Expr::apply("each", vec![Expr::sym(var), collection, body])
    }

    /// Head symbol of an application, if the head is a symbol.
    pub fn head(&self) -> Option<&str> {
        match self {
            Expr::Application(head, _) => match head.as_ref() {
                Expr::Symbol(name) => Some(name),
                _ => None,
            },
            _ => None,
        }
    }
}

impl From<Atom> for Expr {
    fn from(atom: Atom) -> Self {
        Expr::Constant(atom)
    }
}

impl From<i64> for Expr {
    fn from(x: i64) -> Self {
        Expr::Constant(Atom::Integer(x))
    }
}

impl From<&str> for Expr {
    fn from(x: &str) -> Self {
        Expr::Constant(Atom::String(x.to_string()))
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Nil => write!(f, "nil"),
            Atom::Boolean(x) => write!(f, "{}", x),
            Atom::Integer(x) => write!(f, "{}", x),
            Atom::Float(x) => write!(f, "{:?}", x),
            Atom::String(x) => crate::value::write_string(f, x),
            Atom::Keyword(x) => write!(f, ":{}", x),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Symbol(name) => write!(f, "{}", name),
            Expr::Constant(atom) => write!(f, "{}", atom),
            Expr::Application(head, args) => {
                write!(f, "({}", head)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
            Expr::List(items) => write!(f, "[{}]", items.iter().join(" ")),
            Expr::Map(entries) => write!(
                f,
                "{{{}}}",
                entries
                    .iter()
                    .map(|(key, value)| format!("{} {}", key, value))
                    .join(" ")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let expr = Expr::each(
            "x",
            Expr::get(Expr::sym("this"), "items"),
            Expr::Map(vec![(
                Expr::keyword("price"),
                Expr::get(Expr::sym("x"), "price"),
            )]),
        );
        assert_eq!(
            expr.to_string(),
            "(each x (get this :items) {:price (get x :price)})"
        );
        assert_eq!(
            Expr::List(vec![Atom::Nil.into(), Atom::Integer(1).into(), "a".into()]).to_string(),
            "[nil 1 \"a\"]"
        );
    }
}
