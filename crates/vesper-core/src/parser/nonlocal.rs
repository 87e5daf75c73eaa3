//! `nonlocal` statement parsing.
//!
//! Binds one or more names to the nearest enclosing function scope, so that
//! assignments to them inside a nested function body (typically an arrow
//! function closure) mutate the outer binding instead of shadowing it.
//!
//! # Syntax
//!
//! ```vesper
//! nonlocal counter;
//! nonlocal counter, total;
//! ```

use std::fmt::{Display, Formatter};

use nom::bytes::complete::tag;
use nom::character::complete::char;
use nom::combinator::cut;
use nom::error::context;
use nom::multi::separated_list1;
use nom::{IResult, Parser};

use crate::ast::{BodyStatementAst, NonLocalAst};
use crate::nom_tools::{cleanup, NomSpan};
use crate::parser::expected_ident;

use super::VesperParserError;

impl<'base> NonLocalAst<'base> {
    pub fn parse(input: NomSpan<'base>) -> IResult<NomSpan<'base>, NonLocalAst<'base>, VesperParserError<'base>> {
        let (input, _) = cleanup(tag("nonlocal")).parse(input)?;
        let (input, names) = separated_list1(char(','), |i| expected_ident("Missing name", i)).parse(input)?;
        let (input, _) = context("Missing ';'", cut(cleanup(char(';')))).parse(input)?;

        Ok((
            input,
            NonLocalAst {
                names: names.into_iter().map(|item| item.into()).collect(),
            },
        ))
    }

    pub fn parse_body_statement(input: NomSpan<'base>) -> IResult<NomSpan<'base>, BodyStatementAst<'base>, VesperParserError<'base>> {
        let (input, value) = Self::parse(input)?;
        Ok((input, BodyStatementAst::NonLocal(value)))
    }
}

impl Display for NonLocalAst<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "nonlocal ")?;
        for (index, name) in self.names.iter().enumerate() {
            write!(f, "{}", name.text)?;
            if index < self.names.len() - 1 {
                write!(f, ", ")?;
            }
        }
        write!(f, ";")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use crate::{ast::BodyAst, file::SourceFile, nom_tools::State};

    use super::NomSpan;

    #[rstest]
    #[case("{nonlocal counter;}", "{nonlocal counter;}")]
    #[case("{nonlocal counter, total;}", "{nonlocal counter, total;}")]
    fn nonlocal_statement_test<'base>(#[case] code: &'base str, #[case] expected: &'base str) {
        let source_file = SourceFile::new(vec!["<memory>".into()], code.to_string());
        let state = State { file: source_file.clone(), indexer: Default::default() };
        let input = NomSpan::new_extra(source_file.code().as_str(), state);
        let (_, response) = BodyAst::parse(input).unwrap();
        assert_eq!(response.to_string(), expected, "{code}");
    }
}
