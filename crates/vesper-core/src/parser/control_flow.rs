//! `return`, `break`, `continue` and `throw` statement parsing.
//!
//! These four statements all transfer control out of the statement sequence
//! they appear in rather than producing a value, so they share a module.
//!
//! # Syntax
//!
//! ```vesper
//! return;
//! return expression;
//! break;
//! continue;
//! throw expression;
//! ```

use std::fmt::{Display, Formatter};

use nom::bytes::complete::tag;
use nom::character::complete::char;
use nom::combinator::{consumed, cut, opt};
use nom::error::context;
use nom::{IResult, Parser};

use crate::ast::{BodyStatementAst, ExpressionAst, ReturnAst, ThrowAst};
use crate::nom_tools::{cleanup, NomSpan};

use super::VesperParserError;

impl<'base> ReturnAst<'base> {
    pub fn parse(input: NomSpan<'base>) -> IResult<NomSpan<'base>, ReturnAst<'base>, VesperParserError<'base>> {
        let (input, keyword_span) = cleanup(tag("return")).parse(input)?;
        let (input, expression) = opt(ExpressionAst::parse).parse(input)?;
        let (input, _) = context("Missing ';'", cut(cleanup(char(';')))).parse(input)?;

        Ok((
            input,
            ReturnAst {
                keyword_span: keyword_span.into(),
                expression,
            },
        ))
    }

    pub fn parse_body_statement(input: NomSpan<'base>) -> IResult<NomSpan<'base>, BodyStatementAst<'base>, VesperParserError<'base>> {
        let (input, value) = Self::parse(input)?;
        Ok((input, BodyStatementAst::Return(value)))
    }
}

impl Display for ReturnAst<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.expression {
            Some(expression) => write!(f, "return {expression};"),
            None => write!(f, "return;"),
        }
    }
}

impl<'base> ThrowAst<'base> {
    pub fn parse(input: NomSpan<'base>) -> IResult<NomSpan<'base>, ThrowAst<'base>, VesperParserError<'base>> {
        let (input, keyword_span) = cleanup(tag("throw")).parse(input)?;
        let (input, expression) = context("Missing throw expression", cut(ExpressionAst::parse)).parse(input)?;
        let (input, _) = context("Missing ';'", cut(cleanup(char(';')))).parse(input)?;

        Ok((
            input,
            ThrowAst {
                keyword_span: keyword_span.into(),
                expression,
            },
        ))
    }

    pub fn parse_body_statement(input: NomSpan<'base>) -> IResult<NomSpan<'base>, BodyStatementAst<'base>, VesperParserError<'base>> {
        let (input, value) = Self::parse(input)?;
        Ok((input, BodyStatementAst::Throw(value)))
    }
}

impl Display for ThrowAst<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "throw {};", self.expression)
    }
}

/// Parses a `break;` statement for use within a code block.
pub fn parse_break_body_statement(input: NomSpan<'_>) -> IResult<NomSpan<'_>, BodyStatementAst<'_>, VesperParserError<'_>> {
    let (input, (span, _)) = consumed(cleanup(tag("break"))).parse(input)?;
    let (input, _) = context("Missing ';'", cut(cleanup(char(';')))).parse(input)?;
    Ok((input, BodyStatementAst::Break(span.into())))
}

/// Parses a `continue;` statement for use within a code block.
pub fn parse_continue_body_statement(input: NomSpan<'_>) -> IResult<NomSpan<'_>, BodyStatementAst<'_>, VesperParserError<'_>> {
    let (input, (span, _)) = consumed(cleanup(tag("continue"))).parse(input)?;
    let (input, _) = context("Missing ';'", cut(cleanup(char(';')))).parse(input)?;
    Ok((input, BodyStatementAst::Continue(span.into())))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use crate::{ast::BodyAst, file::SourceFile, nom_tools::State};

    use super::NomSpan;

    #[rstest]
    #[case("{return;}", "{return;}")]
    #[case("{return 1 + 2;}", "{return (1 + 2);}")]
    #[case("{break;}", "{break;}")]
    #[case("{continue;}", "{continue;}")]
    #[case("{throw \"bad input\";}", "{throw \"bad input\";}")]
    fn control_flow_statement_test<'base>(#[case] code: &'base str, #[case] expected: &'base str) {
        let source_file = SourceFile::new(vec!["<memory>".into()], code.to_string());
        let state = State { file: source_file.clone(), indexer: Default::default() };
        let input = NomSpan::new_extra(source_file.code().as_str(), state);
        let (_, response) = BodyAst::parse(input).unwrap();
        assert_eq!(response.to_string(), expected, "{code}");
    }
}
