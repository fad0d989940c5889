use super::{
    ast::{Atom, Expr},
    error::ParseError,
};
use itertools::Itertools;
use pest::{iterators::Pair, Parser};
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "expr/grammar.pest"]
struct ExprParser;

/// Parses one expression, e.g. `(each x (get this :items) (get x :price))`.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let program = ExprParser::parse(Rule::program, input)?
        .next()
        .unwrap_or_else(|| unreachable!());
    match program.into_inner().next() {
        Some(pair) if pair.as_rule() == Rule::expr => parse_expr(pair),
        _ => unreachable!(),
    }
}

fn custom_error(pair: &Pair<Rule>, message: &str) -> ParseError {
    pest::error::Error::new_from_span(
        pest::error::ErrorVariant::CustomError {
            message: message.to_string(),
        },
        pair.as_span(),
    )
}

fn parse_expr(pair: Pair<Rule>) -> Result<Expr, ParseError> {
    let pair = pair.into_inner().next().unwrap_or_else(|| unreachable!());
    match pair.as_rule() {
        Rule::application => {
            let mut exprs = pair.into_inner().map(parse_expr);
            let head = exprs.next().unwrap_or_else(|| unreachable!())?;
            Ok(Expr::Application(
                Box::new(head),
                exprs.collect::<Result<_, _>>()?,
            ))
        }
        Rule::list => Ok(Expr::List(
            pair.into_inner()
                .map(parse_expr)
                .collect::<Result<_, _>>()?,
        )),
        Rule::map => {
            let map = pair.clone();
            let exprs = pair
                .into_inner()
                .map(parse_expr)
                .collect::<Result<Vec<_>, _>>()?;
            if exprs.len() % 2 != 0 {
                return Err(custom_error(&map, "map literal needs a value for every key"));
            }
            Ok(Expr::Map(exprs.into_iter().tuples().collect()))
        }
        Rule::nil => Ok(Atom::Nil.into()),
        Rule::boolean => Ok(Atom::Boolean(pair.as_str() == "true").into()),
        Rule::integer => match pair.as_str().parse() {
            Ok(x) => Ok(Atom::Integer(x).into()),
            Err(_) => Err(custom_error(&pair, "integer out of range")),
        },
        Rule::float => match pair.as_str().parse() {
            Ok(x) => Ok(Atom::Float(x).into()),
            Err(_) => Err(custom_error(&pair, "invalid float")),
        },
        Rule::string => {
            let inner = pair.into_inner().next().unwrap_or_else(|| unreachable!());
            Ok(Atom::String(unescape(inner.as_str())).into())
        }
        Rule::keyword => Ok(Atom::Keyword(pair.as_str()[1..].to_string()).into()),
        Rule::symbol => Ok(Expr::Symbol(pair.as_str().to_string())),
        _ => unreachable!(),
    }
}

fn unescape(s: &str) -> String {
    let mut unescaped = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => unescaped.push('\n'),
                Some('t') => unescaped.push('\t'),
                Some(c) => unescaped.push(c),
                None => {}
            },
            c => unescaped.push(c),
        }
    }
    unescaped
}
