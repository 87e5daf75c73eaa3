//! Array literal, object literal and spread expression parsing.
//!
//! # Syntax
//!
//! ```vesper
//! [1, 2, 3]
//! [1, ...rest]
//! { name: "a", age: 1 }
//! call(...args)
//! ```

use nom::bytes::complete::tag;
use nom::character::complete::char;
use nom::combinator::cut;
use nom::error::context;
use nom::multi::separated_list0;
use nom::sequence::{delimited, separated_pair};
use nom::{IResult, Parser};

use crate::ast::ExpressionAst;
use crate::nom_tools::{cleanup, NomSpan};
use crate::parser::ident;

use super::VesperParserError;

impl<'base> ExpressionAst<'base> {
    pub fn spread(input: NomSpan<'base>) -> IResult<NomSpan<'base>, ExpressionAst<'base>, VesperParserError<'base>> {
        let (input, _) = cleanup(tag("...")).parse(input)?;
        let (input, expression) = context("Missing spread expression", cut(Self::inner)).parse(input)?;
        Ok((input, ExpressionAst::Spread(Box::new(expression))))
    }

    pub fn array_literal(input: NomSpan<'base>) -> IResult<NomSpan<'base>, ExpressionAst<'base>, VesperParserError<'base>> {
        let (input, items) = delimited(
            cleanup(char('[')),
            cleanup(separated_list0(char(','), ExpressionAst::parse)),
            context("Missing ']'", cut(cleanup(char(']')))),
        )
        .parse(input)?;

        Ok((input, ExpressionAst::ArrayLiteral(items)))
    }

    pub fn object_literal(input: NomSpan<'base>) -> IResult<NomSpan<'base>, ExpressionAst<'base>, VesperParserError<'base>> {
        let (input, fields) = delimited(
            cleanup(char('{')),
            cleanup(separated_list0(
                char(','),
                separated_pair(ident(), cleanup(char(':')), context("Missing value", cut(ExpressionAst::parse))),
            )),
            context("Missing '}'", cut(cleanup(char('}')))),
        )
        .parse(input)?;

        Ok((input, ExpressionAst::ObjectLiteral(fields.into_iter().map(|(name, value)| (name.into(), value)).collect())))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use crate::{ast::ExpressionAst, file::SourceFile, nom_tools::State};

    use super::NomSpan;

    #[rstest]
    #[case("[1, 2, 3]", "[1, 2, 3]")]
    #[case("[]", "[]")]
    #[case(r#"{ name: "a", age: 1 }"#, r#"{name: "a", age: 1}"#)]
    fn collection_literal_test<'base>(#[case] code: &'base str, #[case] expected: &'base str) {
        let source_file = SourceFile::new(vec!["<memory>".into()], code.to_string());
        let state = State { file: source_file.clone(), indexer: Default::default() };
        let input = NomSpan::new_extra(source_file.code().as_str(), state);
        let (_, response) = ExpressionAst::parse(input).unwrap();
        assert_eq!(response.to_string(), expected, "{code}");
    }

    #[rstest]
    #[case("call(1, ...rest)", "call(1, ...rest)")]
    fn spread_in_call_test<'base>(#[case] code: &'base str, #[case] expected: &'base str) {
        let source_file = SourceFile::new(vec!["<memory>".into()], code.to_string());
        let state = State { file: source_file.clone(), indexer: Default::default() };
        let input = NomSpan::new_extra(source_file.code().as_str(), state);
        let (_, response) = ExpressionAst::parse(input).unwrap();
        assert_eq!(response.to_string(), expected, "{code}");
    }
}
