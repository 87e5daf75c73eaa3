//! `while` and `for` loop parsing.
//!
//! # Syntax
//!
//! ```vesper
//! while condition {
//!     // body
//! }
//!
//! for (item in collection) {
//!     // body
//! }
//! ```

use std::fmt::{Display, Formatter};

use nom::bytes::complete::tag;
use nom::character::complete::char;
use nom::combinator::cut;
use nom::error::context;
use nom::{IResult, Parser};

use crate::ast::{BodyAst, BodyStatementAst, ExpressionAst, ForAst, WhileAst};
use crate::nom_tools::{cleanup, NomSpan};
use crate::parser::expected_ident;

use super::VesperParserError;

impl<'base> WhileAst<'base> {
    pub fn parse(input: NomSpan<'base>) -> IResult<NomSpan<'base>, WhileAst<'base>, VesperParserError<'base>> {
        let (input, _) = cleanup(tag("while")).parse(input)?;
        let (input, condition) = context("Missing while condition", cut(ExpressionAst::parse)).parse(input)?;
        let (input, body) = context("Missing while body", cut(BodyAst::parse)).parse(input)?;

        Ok((input, WhileAst { condition, body }))
    }

    pub fn parse_body_statement(input: NomSpan<'base>) -> IResult<NomSpan<'base>, BodyStatementAst<'base>, VesperParserError<'base>> {
        let (input, value) = Self::parse(input)?;
        Ok((input, BodyStatementAst::While(value)))
    }
}

impl Display for WhileAst<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "while {} {}", self.condition, self.body)
    }
}

impl<'base> ForAst<'base> {
    pub fn parse(input: NomSpan<'base>) -> IResult<NomSpan<'base>, ForAst<'base>, VesperParserError<'base>> {
        let (input, _) = cleanup(tag("for")).parse(input)?;
        let (input, _) = context("Missing '('", cut(cleanup(char('(')))).parse(input)?;
        let (input, variable) = expected_ident("Missing loop variable name", input)?;
        let (input, _) = context("Missing 'in'", cut(cleanup(tag("in")))).parse(input)?;
        let (input, iterable) = context("Missing iterable expression", cut(ExpressionAst::parse)).parse(input)?;
        let (input, _) = context("Missing ')'", cut(cleanup(char(')')))).parse(input)?;
        let (input, body) = context("Missing for body", cut(BodyAst::parse)).parse(input)?;

        Ok((
            input,
            ForAst {
                variable: variable.into(),
                iterable,
                body,
            },
        ))
    }

    pub fn parse_body_statement(input: NomSpan<'base>) -> IResult<NomSpan<'base>, BodyStatementAst<'base>, VesperParserError<'base>> {
        let (input, value) = Self::parse(input)?;
        Ok((input, BodyStatementAst::For(value)))
    }
}

impl Display for ForAst<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "for ({} in {}) {}", self.variable.text, self.iterable, self.body)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use crate::{ast::BodyAst, file::SourceFile, nom_tools::State};

    use super::NomSpan;

    #[rstest]
    #[case("{while true {break;}}", "{while true {break;}}")]
    #[case("{for (item in items) {}}", "{for (item in items) {}}")]
    #[case("{for (item in items) {continue;}}", "{for (item in items) {continue;}}")]
    fn loop_statement_test<'base>(#[case] code: &'base str, #[case] expected: &'base str) {
        let source_file = SourceFile::new(vec!["<memory>".into()], code.to_string());
        let state = State { file: source_file.clone(), indexer: Default::default() };
        let input = NomSpan::new_extra(source_file.code().as_str(), state);
        let (_, response) = BodyAst::parse(input).unwrap();
        assert_eq!(response.to_string(), expected, "{code}");
    }
}
