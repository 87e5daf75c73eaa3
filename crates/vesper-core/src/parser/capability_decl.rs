//! `capability` declaration parsing.
//!
//! A capability declaration names a capability type this function requires,
//! and optionally a resource glob pattern it is scoped to. Wherever it
//! textually appears in a function body, the AST transformer lifts it to the
//! owning module's preamble, so the parser here only needs to recognize the
//! statement form, not where in a block it may legally appear.
//!
//! # Syntax
//!
//! ```vesper
//! capability fs.read;
//! capability fs.read on "/data/**";
//! ```

use std::fmt::{Display, Formatter};

use nom::bytes::complete::tag;
use nom::character::complete::char;
use nom::combinator::{consumed, cut, opt};
use nom::error::context;
use nom::multi::separated_list1;
use nom::sequence::preceded;
use nom::{IResult, Parser};

use crate::ast::{BodyStatementAst, CapabilityDeclarationAst};
use crate::nom_tools::{cleanup, NomSpan};
use crate::parser::{ident, primitive::string};

use super::VesperParserError;

impl<'base> CapabilityDeclarationAst<'base> {
    pub fn parse(input: NomSpan<'base>) -> IResult<NomSpan<'base>, CapabilityDeclarationAst<'base>, VesperParserError<'base>> {
        let (input, _) = cleanup(tag("capability")).parse(input)?;
        let (input, capability_type) = consumed(separated_list1(char('.'), ident())).parse(input)?;
        let (input, resource_pattern) = opt(preceded(cleanup(tag("on")), context("Missing resource pattern", cut(consumed(string))))).parse(input)?;
        let (input, _) = context("Missing ';'", cut(cleanup(char(';')))).parse(input)?;

        Ok((
            input,
            CapabilityDeclarationAst {
                capability_type: capability_type.0.into(),
                resource_pattern: resource_pattern.map(|(span, _)| span.into()),
            },
        ))
    }

    pub fn parse_body_statement(input: NomSpan<'base>) -> IResult<NomSpan<'base>, BodyStatementAst<'base>, VesperParserError<'base>> {
        let (input, value) = Self::parse(input)?;
        Ok((input, BodyStatementAst::CapabilityDeclaration(value)))
    }
}

impl Display for CapabilityDeclarationAst<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "capability {}", self.capability_type.text)?;
        if let Some(pattern) = &self.resource_pattern {
            write!(f, " on {}", pattern.text)?;
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
    #[case("{capability fs.read;}", "{capability fs.read;}")]
    #[case(r#"{capability fs.read on "/data/**";}"#, r#"{capability fs.read on "/data/**";}"#)]
    fn capability_declaration_test<'base>(#[case] code: &'base str, #[case] expected: &'base str) {
        let source_file = SourceFile::new(vec!["<memory>".into()], code.to_string());
        let state = State { file: source_file.clone(), indexer: Default::default() };
        let input = NomSpan::new_extra(source_file.code().as_str(), state);
        let (_, response) = BodyAst::parse(input).unwrap();
        assert_eq!(response.to_string(), expected, "{code}");
    }
}
