//! `try` / `except` / `finally` statement parsing.
//!
//! # Syntax
//!
//! ```vesper
//! try {
//!     riskyCall();
//! } except (e) {
//!     handle(e);
//! } finally {
//!     cleanup();
//! }
//! ```
//!
//! A `try` block may carry zero or more `except` handlers and an optional
//! trailing `finally` block. A handler's binding name is optional: `except { }`
//! catches without exposing the raised value.

use std::fmt::{Display, Formatter};

use nom::bytes::complete::tag;
use nom::character::complete::char;
use nom::combinator::{cut, opt};
use nom::error::context;
use nom::multi::many0;
use nom::sequence::delimited;
use nom::{IResult, Parser};

use crate::ast::{BodyAst, BodyStatementAst, ExceptHandlerAst, TryExceptFinallyAst};
use crate::nom_tools::{cleanup, NomSpan};
use crate::parser::ident;

use super::VesperParserError;

impl<'base> TryExceptFinallyAst<'base> {
    pub fn parse(input: NomSpan<'base>) -> IResult<NomSpan<'base>, TryExceptFinallyAst<'base>, VesperParserError<'base>> {
        let (input, _) = cleanup(tag("try")).parse(input)?;
        let (input, try_body) = context("Missing try body", cut(BodyAst::parse)).parse(input)?;
        let (input, handlers) = many0(ExceptHandlerAst::parse).parse(input)?;
        let (input, finally_body) = match cleanup(opt(tag("finally"))).parse(input)? {
            (input, Some(_)) => {
                let (input, body) = context("Missing finally body", cut(BodyAst::parse)).parse(input)?;
                (input, Some(body))
            }
            (input, None) => (input, None),
        };

        Ok((
            input,
            TryExceptFinallyAst {
                try_body,
                handlers,
                finally_body,
            },
        ))
    }

    pub fn parse_body_statement(input: NomSpan<'base>) -> IResult<NomSpan<'base>, BodyStatementAst<'base>, VesperParserError<'base>> {
        let (input, value) = Self::parse(input)?;
        Ok((input, BodyStatementAst::TryExceptFinally(value)))
    }
}

impl<'base> ExceptHandlerAst<'base> {
    fn parse(input: NomSpan<'base>) -> IResult<NomSpan<'base>, ExceptHandlerAst<'base>, VesperParserError<'base>> {
        let (input, _) = cleanup(tag("except")).parse(input)?;
        let (input, binding) = opt(delimited(cleanup(char('(')), ident(), context("Missing ')'", cut(cleanup(char(')')))))).parse(input)?;
        let (input, body) = context("Missing except body", cut(BodyAst::parse)).parse(input)?;

        Ok((
            input,
            ExceptHandlerAst {
                binding: binding.map(Into::into),
                body,
            },
        ))
    }
}

impl Display for TryExceptFinallyAst<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "try {}", self.try_body)?;
        for handler in &self.handlers {
            write!(f, " {handler}")?;
        }
        if let Some(finally_body) = &self.finally_body {
            write!(f, " finally {finally_body}")?;
        }
        Ok(())
    }
}

impl Display for ExceptHandlerAst<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.binding {
            Some(binding) => write!(f, "except ({}) {}", binding.text, self.body),
            None => write!(f, "except {}", self.body),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use crate::{ast::BodyAst, file::SourceFile, nom_tools::State};

    use super::NomSpan;

    #[rstest]
    #[case("{try {call();} except (e) {call();}}", "{try {call();} except (e) {call();}}")]
    #[case("{try {call();} except {call();} finally {call();}}", "{try {call();} except {call();} finally {call();}}")]
    #[case("{try {call();} finally {call();}}", "{try {call();} finally {call();}}")]
    fn try_except_test<'base>(#[case] code: &'base str, #[case] expected: &'base str) {
        let source_file = SourceFile::new(vec!["<memory>".into()], code.to_string());
        let state = State { file: source_file.clone(), indexer: Default::default() };
        let input = NomSpan::new_extra(source_file.code().as_str(), state);
        let (_, response) = BodyAst::parse(input).unwrap();
        assert_eq!(response.to_string(), expected, "{code}");
    }
}
