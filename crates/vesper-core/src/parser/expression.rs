//! Expression parsing with operator precedence for the Vesper language.
//!
//! This module implements a recursive descent parser for Vesper expressions using operator
//! precedence climbing. It handles all expression types including:
//!
//! - Arithmetic operations: `+`, `-`, `*`, `/`, `%`
//! - Logical operations: `&&`, `||`, `!`
//! - Bitwise operations: `&`, `|`, `^`, `<<`, `>>`
//! - Comparison operations: `==`, `!=`, `<`, `>`, `<=`, `>=`
//! - Function calls and method invocations
//! - Variable references and field access
//! - Parenthesized expressions
//!
//! # Operator Precedence
//!
//! The parser implements the following precedence levels (highest to lowest):
//! 1. **Primary expressions**: literals, identifiers, parentheses, function calls
//! 2. **Multiplicative**: `*`, `/`, `%`
//! 3. **Additive**: `+`, `-`
//! 4. **Bitwise shift**: `<<`, `>>`
//! 5. **Relational**: `<`, `>`, `<=`, `>=`
//! 6. **Equality**: `==`, `!=`
//! 7. **Bitwise AND**: `&`
//! 8. **Bitwise XOR**: `^`
//! 9. **Bitwise OR**: `|`
//! 10. **Logical AND**: `&&`
//! 11. **Logical OR**: `||`
//!
//! # Architecture
//!
//! The module uses a trait-based approach where each precedence level is implemented
//! as a separate parser struct implementing `VesperExpressionParser`. This provides
//! clean separation of concerns and makes the precedence hierarchy explicit.

use std::fmt::{Display, Formatter};

use nom::{branch::alt, bytes::complete::tag, character::complete::char, combinator::{cut, not, opt, value}, error::context, multi::{many, separated_list0}, sequence::{delimited, pair, preceded, terminated}, IResult, Parser};

use crate::{ast::{ArrowFunctionAst, ArrowFunctionBodyAst, ExpressionAst, ExpressionOperatorType, FunctionCallAst, MatchArmAst, PrimitiveValue, RefAst}, nom_tools::{cleanup, NomSpan}};

use super::{ident, VesperParserError};

/// Type alias for expression generator functions used in operator parsing
/// 
/// This function type is used to create binary expression AST nodes from
/// left operand, operator, and right operand.
pub type ControlExpressionGeneratorFn<'base, T> = fn(ExpressionAst<'base>, T, ExpressionAst<'base>) -> ExpressionAst<'base>;

/// Trait for expression parsers at different precedence levels
/// 
/// Each precedence level implements this trait to provide a uniform
/// interface for parsing expressions at that level.
pub trait VesperExpressionParser {
    /// Parse an expression at this precedence level
    fn parse(input: NomSpan<'_>) -> IResult<NomSpan<'_>, ExpressionAst, VesperParserError<'_>>;
}

// Precedence level parsers (listed from lowest to highest precedence)

/// Parser for the pipeline operator (`|>`) - lowest precedence of all
struct PipelineParser;

/// Parser for the ternary conditional (`cond ? a : b`), right-associative
struct TernaryParser;

/// Parser for logical OR expressions (`||`) - lowest precedence
struct OrParser;

/// Parser for logical AND expressions (`&&`)
struct AndParser;

/// Parser for bitwise XOR expressions (`^`)
struct BitwiseXorParser;

/// Parser for bitwise OR expressions (`|`)
struct BitwiseOrParser;

/// Parser for bitwise AND expressions (`&`)
struct BitwiseAndParser;

/// Parser for equality expressions (`==`, `!=`)
struct EqualParser;

/// Parser for relational expressions (`<`, `>`, `<=`, `>=`)
struct LessEqualParser;

/// Parser for bitwise shift expressions (`<<`, `>>`)
struct BitwiseShiftParser;

/// Parser for additive expressions (`+`, `-`)
struct AddSubParser;

/// Parser for multiplicative expressions (`*`, `/`, `%`) - highest binary precedence
struct MulDivModParser;

/// Parser for primary expressions (literals, identifiers, function calls, parentheses)
struct InnerParser;

impl VesperExpressionParser for PipelineParser {
    fn parse(input: NomSpan<'_>) -> IResult<NomSpan<'_>, ExpressionAst, VesperParserError<'_>> {
        let (input, initial) = TernaryParser::parse(input)?;
        let (input, remainder) = many(0.., preceded(cleanup(tag("|>")), context("Expression missing after '|>'", cut(TernaryParser::parse)))).parse(input)?;
        Ok((
            input,
            remainder.into_iter().fold(initial, |left, right| ExpressionAst::Pipeline { left: Box::new(left), right: Box::new(right) }),
        ))
    }
}

impl VesperExpressionParser for TernaryParser {
    fn parse(input: NomSpan<'_>) -> IResult<NomSpan<'_>, ExpressionAst, VesperParserError<'_>> {
        let (input, condition) = OrParser::parse(input)?;
        let Ok((input, _)) = cleanup(char('?')).parse(input) else {
            return Ok((input, condition));
        };
        let (input, if_true) = context("Ternary 'true' branch missing", cut(OrParser::parse)).parse(input)?;
        let (input, _) = context("Ternary missing ':'", cut(cleanup(char(':')))).parse(input)?;
        let (input, if_false) = context("Ternary 'false' branch missing", cut(Self::parse)).parse(input)?;
        Ok((
            input,
            ExpressionAst::Ternary { condition: Box::new(condition), if_true: Box::new(if_true), if_false: Box::new(if_false) },
        ))
    }
}

impl VesperExpressionParser for OrParser {
    fn parse(input: NomSpan<'_>) -> IResult<NomSpan<'_>, ExpressionAst, VesperParserError<'_>> {
        ExpressionAst::single_parser::<'_, AndParser, _, _>(input, ExpressionOperatorType::Or, tag("||"), ExpressionAst::expr_builder)
    }
}

impl VesperExpressionParser for AndParser {
    fn parse(input: NomSpan<'_>) -> IResult<NomSpan<'_>, ExpressionAst, VesperParserError<'_>> {
        ExpressionAst::single_parser::<'_, BitwiseXorParser, _, _>(input, ExpressionOperatorType::And, tag("&&"), ExpressionAst::expr_builder)
    }
}

impl VesperExpressionParser for BitwiseXorParser {
    fn parse(input: NomSpan<'_>) -> IResult<NomSpan<'_>, ExpressionAst, VesperParserError<'_>> {
        ExpressionAst::single_parser::<'_, BitwiseOrParser, _, _>(input, ExpressionOperatorType::Xor, char('^'), ExpressionAst::expr_builder)
    }
}

impl VesperExpressionParser for BitwiseOrParser {
    fn parse(input: NomSpan<'_>) -> IResult<NomSpan<'_>, ExpressionAst, VesperParserError<'_>> {
        ExpressionAst::single_parser::<'_, BitwiseAndParser, _, _>(input, ExpressionOperatorType::LogicalOr, (char('|'), not(char('|'))), ExpressionAst::expr_builder)
    }
}

impl VesperExpressionParser for BitwiseAndParser {
    fn parse(input: NomSpan<'_>) -> IResult<NomSpan<'_>, ExpressionAst, VesperParserError<'_>> {
        ExpressionAst::single_parser::<'_, EqualParser, _, _>(input, ExpressionOperatorType::LogicalAnd, (char('&'), not(char('&'))), ExpressionAst::expr_builder)
    }
}

impl VesperExpressionParser for EqualParser {
    fn parse(input: NomSpan<'_>) -> IResult<NomSpan<'_>, ExpressionAst, VesperParserError<'_>> {
        ExpressionAst::value_parser::<'_, LessEqualParser, _, _>(input, alt((
            value(ExpressionOperatorType::Equal, tag("==")),
            value(ExpressionOperatorType::NotEqual, tag("!="))
        )), ExpressionAst::expr_builder)
    }
}

impl VesperExpressionParser for LessEqualParser {
    fn parse(input: NomSpan<'_>) -> IResult<NomSpan<'_>, ExpressionAst, VesperParserError<'_>> {
        ExpressionAst::value_parser::<'_, BitwiseShiftParser, _, _>(input, alt((
            value(ExpressionOperatorType::LessEqualThan, tag("<=")),
            value(ExpressionOperatorType::GreaterEqualThan, tag(">=")),
            value(ExpressionOperatorType::GreaterThan, char('>')),
            value(ExpressionOperatorType::LessThan, char('<')),
        )), ExpressionAst::expr_builder)
    }
}

impl VesperExpressionParser for BitwiseShiftParser {
    fn parse(input: NomSpan<'_>) -> IResult<NomSpan<'_>, ExpressionAst, VesperParserError<'_>> {
        ExpressionAst::value_parser::<'_, AddSubParser, _, _>(input, alt((
            value(ExpressionOperatorType::BitwiseShiftRight, tag(">>")),
            value(ExpressionOperatorType::BitwiseShiftLeft, tag("<<")),
        )), ExpressionAst::expr_builder)
    }
}

impl VesperExpressionParser for AddSubParser {
    fn parse(input: NomSpan<'_>) -> IResult<NomSpan<'_>, ExpressionAst, VesperParserError<'_>> {
        ExpressionAst::value_parser::<'_, MulDivModParser, _, _>(input, alt((
            value(ExpressionOperatorType::Add, char('+')),
            value(ExpressionOperatorType::Sub, char('-'))
        )), ExpressionAst::expr_builder)
    }
}

impl VesperExpressionParser for MulDivModParser {
    fn parse(input: NomSpan<'_>) -> IResult<NomSpan<'_>, ExpressionAst, VesperParserError<'_>> {
        ExpressionAst::value_parser::<'_, InnerParser, _, _>(input, alt((
            value(ExpressionOperatorType::Div, char('/')),
            value(ExpressionOperatorType::Mul, char('*')),
            value(ExpressionOperatorType::Mod, char('%')),
        )), ExpressionAst::expr_builder)
    }
}

impl VesperExpressionParser for InnerParser {
    fn parse(input: NomSpan<'_>) -> IResult<NomSpan<'_>, ExpressionAst, VesperParserError<'_>> {
        ExpressionAst::inner(input)
    }
}

impl ExpressionAst<'_> {
    pub fn parse(input: NomSpan<'_>) -> IResult<NomSpan<'_>, ExpressionAst, VesperParserError<'_>> {
        PipelineParser::parse(input)
    }

    fn inner(input: NomSpan<'_>) -> IResult<NomSpan<'_>, ExpressionAst, VesperParserError<'_>> {
        let (input, expression) = cleanup(alt((
            Self::match_expr,
            RefAst::parse_for_expression,
            FunctionCallAst::parse_for_expression,
            Self::array_literal,
            Self::object_literal,
            Self::spread,
            PrimitiveValue::parse_for_expression,
            Self::not,
            Self::parentheses,
            ArrowFunctionAst::parse_for_expression,
            Self::ident_for_expression,
        ))).parse(input)?;

        Self::postfix_array_access(input, expression)
    }

    /// Folds zero or more trailing `[index]` accesses onto an already-parsed
    /// primary expression, e.g. `items[0][1]`.
    fn postfix_array_access<'base>(input: NomSpan<'base>, initial: ExpressionAst<'base>) -> IResult<NomSpan<'base>, ExpressionAst<'base>, VesperParserError<'base>> {
        let (input, accesses) = many(
            0..,
            preceded(cleanup(char('[')), terminated(context("Missing index expression", cut(Self::parse)), context("Missing ']'", cut(cleanup(char(']')))))),
        )
        .parse(input)?;

        Ok((input, accesses.into_iter().fold(initial, |target, index| ExpressionAst::ArrayAccess { target: Box::new(target), index: Box::new(index) })))
    }

    /// Parses `match (subject) { pattern => body, pattern if guard => body, ... }`.
    fn match_expr(input: NomSpan<'_>) -> IResult<NomSpan<'_>, ExpressionAst, VesperParserError<'_>> {
        let (input, _) = cleanup(tag("match")).parse(input)?;
        let (input, _) = context("Match missing '('", cut(cleanup(char('(')))).parse(input)?;
        let (input, subject) = context("Match subject missing", cut(Self::parse)).parse(input)?;
        let (input, _) = context("Match missing ')'", cut(cleanup(char(')')))).parse(input)?;
        let (input, _) = context("Match missing '{'", cut(cleanup(char('{')))).parse(input)?;
        let (input, arms) = cleanup(separated_list0(cleanup(char(',')), MatchArmAst::parse)).parse(input)?;
        let (input, _) = cleanup(opt(char(','))).parse(input)?;
        let (input, _) = context("Match missing '}'", cut(cleanup(char('}')))).parse(input)?;

        Ok((input, ExpressionAst::Match { subject: Box::new(subject), arms }))
    }

    pub fn parentheses(input: NomSpan<'_>) -> IResult<NomSpan<'_>, ExpressionAst, VesperParserError<'_>> {
        let (input, expr) = delimited(char('('), cleanup(Self::parse), char(')')).parse(input)?;
        Ok((input, expr))
    }

    pub fn not(input: NomSpan<'_>) -> IResult<NomSpan<'_>, ExpressionAst, VesperParserError<'_>> {
        let (input, _) = cleanup(char('!')).parse(input)?;
        let (input, expression) = context("Expression missing", cut(Self::inner)).parse(input)?;
        Ok((
            input,
            ExpressionAst::Not(Box::new(expression)),
        ))
    }

    fn ident_for_expression(input: NomSpan<'_>) -> IResult<NomSpan<'_>, ExpressionAst<'_>, VesperParserError<'_>> {
        let (input, ident) = ident().parse(input)?;
        Ok((
            input,
            ExpressionAst::Ident(ident.into()),
        ))
    }

    pub fn expr_builder<'base>(left: ExpressionAst<'base>, operator: ExpressionOperatorType, right: ExpressionAst<'base>) -> ExpressionAst<'base> {
        ExpressionAst::Operation {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        }
    }

    #[allow(private_bounds)]
    pub fn single_parser<'base, P: VesperExpressionParser, T: Copy, F: Parser<NomSpan<'base>, Error = VesperParserError<'base>>>(input: NomSpan<'base>, val: T, parser: F, expr_func: ControlExpressionGeneratorFn<'base, T>) -> IResult<NomSpan<'base>, ExpressionAst<'base>, VesperParserError<'base>> {
        let (input, initial) = P::parse(input)?;
        let (input, remainder): (NomSpan<'_>, Vec<ExpressionAst<'_>>) = many(0.., preceded(parser, P::parse)).parse(input)?;
        Ok((input, Self::single_fold_exprs::<T>(initial, val, remainder, expr_func)))
    }
    
    #[allow(private_bounds)]
    pub fn value_parser<'base, P: VesperExpressionParser, T: Copy, F: Parser<NomSpan<'base>, Error = VesperParserError<'base>>>(input: NomSpan<'base>, parser: F, expr_func: ControlExpressionGeneratorFn<'base, T>) -> IResult<NomSpan<'base>, ExpressionAst<'base>, VesperParserError<'base>> 
        where Vec<(T, ExpressionAst<'base>)>: Extend<(<F as Parser<NomSpan<'base>>>::Output, ExpressionAst<'base>)>
    {
        let (input, initial) = P::parse(input)?;
        let (input, remainder): (NomSpan<'_>, Vec<(T, ExpressionAst<'_>)>) = many(0.., pair(parser, P::parse)).parse(input)?;
        Ok((input, Self::value_fold_exprs::<T>(initial, remainder, expr_func)))
    }

    pub fn single_fold_exprs<'base, T: Copy>(initial: ExpressionAst<'base>, operator: T, remainder: Vec<ExpressionAst<'base>>, expr_func: ControlExpressionGeneratorFn<'base, T>) -> ExpressionAst<'base> {
        remainder.into_iter().fold(initial, |left, right| {
          expr_func(left, operator, right)
        })
    }

    pub fn value_fold_exprs<'base, T: Copy>(initial: ExpressionAst<'base>, remainder: Vec<(T, ExpressionAst<'base>)>, expr_func: ControlExpressionGeneratorFn<'base, T>) -> ExpressionAst<'base> {
        remainder.into_iter().fold(initial, |left, (operator, right)| {
          expr_func(left, operator, right)
        })
    }
}

impl<'base> MatchArmAst<'base> {
    /// Parses `pattern [if guard] => body`.
    pub fn parse(input: NomSpan<'base>) -> IResult<NomSpan<'base>, MatchArmAst<'base>, VesperParserError<'base>> {
        let (input, pattern) = OrParser::parse(input)?;
        let (input, guard) = opt(preceded(cleanup(tag("if")), context("Missing guard expression", cut(OrParser::parse)))).parse(input)?;
        let (input, _) = context("Missing '=>'", cut(cleanup(tag("=>")))).parse(input)?;
        let (input, body) = context("Missing arm body", cut(ArrowFunctionBodyAst::parse)).parse(input)?;

        Ok((input, MatchArmAst { pattern, guard, body }))
    }
}

impl Display for MatchArmAst<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.pattern)?;
        if let Some(guard) = &self.guard {
            write!(f, " if {guard}")?;
        }
        write!(f, " => {}", self.body)
    }
}

impl Display for ExpressionAst<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpressionAst::Primitive { value, .. } => write!(f, "{value}"),
            ExpressionAst::Ident(ident) => write!(f, "{ident}"),
            ExpressionAst::FunctionCall(function_call) => write!(f, "{function_call}"),
            ExpressionAst::Operation { left, operator, right } => {
                write!(f, "({left} {operator} {right})")
            },
            ExpressionAst::Ref(ref_expr) => {
                write!(f, "{ref_expr}")
            },
            ExpressionAst::Not(expression) => {
                write!(f, "!{expression}")
            },
            ExpressionAst::Ternary { condition, if_true, if_false } => {
                write!(f, "({condition} ? {if_true} : {if_false})")
            },
            ExpressionAst::ArrowFunction(arrow) => write!(f, "{arrow}"),
            ExpressionAst::ArrayLiteral(items) => {
                write!(f, "[")?;
                for (index, item) in items.iter().enumerate() {
                    write!(f, "{item}")?;
                    if index < items.len() - 1 {
                        write!(f, ", ")?;
                    }
                }
                write!(f, "]")
            },
            ExpressionAst::ObjectLiteral(fields) => {
                write!(f, "{{")?;
                for (index, (name, value)) in fields.iter().enumerate() {
                    write!(f, "{}: {value}", name.text)?;
                    if index < fields.len() - 1 {
                        write!(f, ", ")?;
                    }
                }
                write!(f, "}}")
            },
            ExpressionAst::Destructuring(pattern) => write!(f, "{pattern}"),
            ExpressionAst::Spread(expression) => write!(f, "...{expression}"),
            ExpressionAst::Match { subject, arms } => {
                write!(f, "match ({subject}) {{")?;
                for (index, arm) in arms.iter().enumerate() {
                    write!(f, "{arm}")?;
                    if index < arms.len() - 1 {
                        write!(f, ", ")?;
                    }
                }
                write!(f, "}}")
            },
            ExpressionAst::Pipeline { left, right } => write!(f, "({left} |> {right})"),
            ExpressionAst::ArrayAccess { target, index } => write!(f, "{target}[{index}]"),
        }
    }
}

impl Display for ExpressionOperatorType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpressionOperatorType::Add => write!(f, "+"),
            ExpressionOperatorType::Sub => write!(f, "-"),
            ExpressionOperatorType::Mul => write!(f, "*"),
            ExpressionOperatorType::Div => write!(f, "/"),
            ExpressionOperatorType::Mod => write!(f, "%"),
            ExpressionOperatorType::And => write!(f, "&&"),
            ExpressionOperatorType::Or => write!(f, "||"),
            ExpressionOperatorType::Equal => write!(f, "=="),
            ExpressionOperatorType::NotEqual => write!(f, "!="),
            ExpressionOperatorType::LessThan => write!(f, "<"),
            ExpressionOperatorType::GreaterThan => write!(f, ">"),
            ExpressionOperatorType::GreaterEqualThan => write!(f, ">="),
            ExpressionOperatorType::LessEqualThan => write!(f, "<="),
            ExpressionOperatorType::Xor => write!(f, "^"),
            ExpressionOperatorType::LogicalOr => write!(f, "|"),
            ExpressionOperatorType::LogicalAnd => write!(f, "&"),
            ExpressionOperatorType::BitwiseShiftLeft => write!(f, "<<"),
            ExpressionOperatorType::BitwiseShiftRight => write!(f, ">>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::{ast::ExpressionAst, file::SourceFile, nom_tools::{NomSpan, State}};

    #[rstest]
    #[case("1", "1")]
    #[case("1-2", "(1 - 2)")]
    #[case("1+2", "(1 + 2)")]
    #[case("(1+2)", "(1 + 2)")]
    #[case("    1 / 2  ", "(1 / 2)")]
    #[case("    1 / 2  ", "(1 / 2)")]
    #[case("    call(1,2,3) / 2  ", "(call(1, 2, 3) / 2)")]
    #[case("  \r\n\t  1 \r\n\t/\r\n\t 2  \r\n\t", "(1 / 2)")]
    #[case("2*2/ 2 * 22 - 2 - ( 5 - 1) + 3", "((((((2 * 2) / 2) * 22) - 2) - (5 - 1)) + 3)")]
    fn binary_test<'base>(#[case] code: &'base str, #[case] expected: &'base str) {
        let source_file = SourceFile::new(vec!["<memory>".into()], code.to_string());

        let state = State {
            file: source_file.clone(),
        indexer: Default::default(),
    };

        let input = NomSpan::new_extra(source_file.code().as_str(), state);
        let (_, response) = ExpressionAst::parse(input).unwrap();
        assert_eq!(response.to_string(), expected, "{code}");
    }

    #[rstest]
    #[case("!1", "!1")]
    #[case("!1 + 10", "(!1 + 10)")]
    #[case("!1", "!1")]
    #[case("!!1", "!!1")]
    #[case("!call(10)", "!call(10)")]
    #[case("!call(10) - 20", "(!call(10) - 20)")]
    fn not_test<'base>(#[case] code: &'base str, #[case] expected: &'base str) {
        let source_file = SourceFile::new(vec!["<memory>".into()], code.to_string());

        let state = State {
            file: source_file.clone(),
            indexer: Default::default(),
        };

        let input = NomSpan::new_extra(source_file.code().as_str(), state);
        let (_, response) = ExpressionAst::parse(input).unwrap();
        assert_eq!(response.to_string(), expected, "{code}");
    }

    #[rstest]
    #[case("1 - 10 == 20", "((1 - 10) == 20)")]
    #[case("1 - 10 == 20 * 4", "((1 - 10) == (20 * 4))")]
    #[case("1 - 10 == 20 * 4", "((1 - 10) == (20 * 4))")]
    #[case("1 - 10 == 20 * 4 >> 2", "((1 - 10) == ((20 * 4) >> 2))")]
    #[case("1 - 10 == 20 * 4 << 2", "((1 - 10) == ((20 * 4) << 2))")]
    #[case("20 && 10 | 30", "(20 && (10 | 30))")]
    #[case("20 || 10 & 30", "(20 || (10 & 30))")]
    #[case("20 % 10 == 10 || 30 > 20", "(((20 % 10) == 10) || (30 > 20))")]
    #[case("20 % 10 != 10 || 30 >= 20", "(((20 % 10) != 10) || (30 >= 20))")]
    #[case("20 % 10 != 10 || 30 < 20", "(((20 % 10) != 10) || (30 < 20))")]
    #[case("20 % 10 != 10 || 30 <= 20", "(((20 % 10) != 10) || (30 <= 20))")]
    #[case("20 ^ 10 | 30", "(20 ^ (10 | 30))")]
    fn general_test<'base>(#[case] code: &'base str, #[case] expected: &'base str) {
        let source_file = SourceFile::new(vec!["<memory>".into()], code.to_string());

        let state = State {
            file: source_file.clone(),
            indexer: Default::default(),
        };

        let input = NomSpan::new_extra(source_file.code().as_str(), state);
        let (_, response) = ExpressionAst::parse(input).unwrap();
        assert_eq!(response.to_string(), expected, "{code}");
    }
}
