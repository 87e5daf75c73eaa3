//! Arrow function expression parsing.
//!
//! # Syntax
//!
//! ```vesper
//! (x: i32) => x + 1;
//! (x: i32, y: i32) => { return x + y; };
//! () => { notify(); };
//! ```
//!
//! An arrow function with an expression body is equivalent, for every later
//! pipeline stage, to one with a block body containing a single `return`
//! statement; the transformer performs that rewrite so the emitter only
//! needs to handle the block form.

use std::fmt::{Display, Formatter};

use nom::bytes::complete::tag;
use nom::character::complete::char;
use nom::combinator::{consumed, cut, map};
use nom::error::context;
use nom::multi::separated_list0;
use nom::sequence::delimited;
use nom::{IResult, Parser};

use crate::ast::{ArrowFunctionAst, ArrowFunctionBodyAst, BodyAst, ExpressionAst, FunctionArgumentAst};
use crate::nom_tools::{cleanup, NomSpan};

use super::VesperParserError;

impl<'base> ArrowFunctionAst<'base> {
    pub fn parse(input: NomSpan<'base>) -> IResult<NomSpan<'base>, ArrowFunctionAst<'base>, VesperParserError<'base>> {
        let (input, (arguments_span, arguments)) = consumed(map(
            delimited(char('('), cleanup(separated_list0(char(','), FunctionArgumentAst::parse)), context("Missing ')'", cut(char(')')))),
            |items| items,
        ))
        .parse(input)?;
        let (input, _) = context("Missing '=>'", cut(cleanup(tag("=>")))).parse(input)?;
        let (input, body) = context("Missing arrow function body", cut(ArrowFunctionBodyAst::parse)).parse(input)?;

        Ok((
            input,
            ArrowFunctionAst {
                arguments,
                arguments_span: arguments_span.into(),
                body,
            },
        ))
    }

    pub fn parse_for_expression(input: NomSpan<'base>) -> IResult<NomSpan<'base>, ExpressionAst<'base>, VesperParserError<'base>> {
        let (input, value) = Self::parse(input)?;
        Ok((input, ExpressionAst::ArrowFunction(value)))
    }
}

impl<'base> ArrowFunctionBodyAst<'base> {
    pub fn parse(input: NomSpan<'base>) -> IResult<NomSpan<'base>, ArrowFunctionBodyAst<'base>, VesperParserError<'base>> {
        if cleanup(nom::combinator::peek(char('{'))).parse(input).is_ok() {
            let (input, body) = BodyAst::parse(input)?;
            return Ok((input, ArrowFunctionBodyAst::Block(body)));
        }

        let (input, expression) = ExpressionAst::parse(input)?;
        Ok((input, ArrowFunctionBodyAst::Expression(Box::new(expression))))
    }
}

impl Display for ArrowFunctionAst<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (index, argument) in self.arguments.iter().enumerate() {
            write!(f, "{argument}")?;
            if index < self.arguments.len() - 1 {
                write!(f, ", ")?;
            }
        }
        write!(f, ") => {}", self.body)
    }
}

impl Display for ArrowFunctionBodyAst<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ArrowFunctionBodyAst::Expression(expression) => write!(f, "{expression}"),
            ArrowFunctionBodyAst::Block(body) => write!(f, "{body}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use crate::{ast::ExpressionAst, file::SourceFile, nom_tools::State};

    use super::NomSpan;

    #[rstest]
    #[case("(x: i32) => x", "(x: i32) => x")]
    #[case("(x: i32, y: i32) => x + y", "(x: i32, y: i32) => (x + y)")]
    #[case("() => { return 1; }", "() => {return 1;}")]
    fn arrow_function_test<'base>(#[case] code: &'base str, #[case] expected: &'base str) {
        let source_file = SourceFile::new(vec!["<memory>".into()], code.to_string());
        let state = State { file: source_file.clone(), indexer: Default::default() };
        let input = NomSpan::new_extra(source_file.code().as_str(), state);
        let (_, response) = ExpressionAst::parse(input).unwrap();
        assert_eq!(response.to_string(), expected, "{code}");
    }
}
