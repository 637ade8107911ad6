//! Placeholder scanning for `Fn::Sub` templates using `nom`.
//!
//! A template is literal text interleaved with `${Name}` or
//! `${Name.Attribute}` placeholders. `${!Literal}` escapes a placeholder
//! and renders as the literal `${Literal}`.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_till1, take_until, take_while1},
    character::complete::char,
    combinator::{not, value},
    sequence::{delimited, terminated},
};
use stackplan_common::error::{Result, StackplanError};

/// A piece of a `Fn::Sub` template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied through verbatim.
    Literal(String),
    /// A `${...}` placeholder.
    Placeholder {
        /// Variable, parameter, or resource name.
        name: String,
        /// Attribute after the first `.`, if any.
        attribute: Option<String>,
    },
}

const fn is_placeholder_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, ':' | '.' | '_' | '-')
}

/// Parses `${!...}` into the literal text `${...}`.
fn escaped(input: &str) -> IResult<&str, Segment> {
    let (input, body) = delimited(tag("${!"), take_until("}"), char('}')).parse(input)?;
    Ok((input, Segment::Literal(format!("${{{body}}}"))))
}

fn placeholder(input: &str) -> IResult<&str, Segment> {
    let (input, body) =
        delimited(tag("${"), take_while1(is_placeholder_char), char('}')).parse(input)?;
    let segment = match body.split_once('.') {
        Some((name, attribute)) => Segment::Placeholder {
            name: name.to_owned(),
            attribute: Some(attribute.to_owned()),
        },
        None => Segment::Placeholder {
            name: body.to_owned(),
            attribute: None,
        },
    };
    Ok((input, segment))
}

fn literal_run(input: &str) -> IResult<&str, Segment> {
    let (input, text) = take_till1(|c: char| c == '$')(input)?;
    Ok((input, Segment::Literal(text.to_owned())))
}

/// A `$` that does not open a placeholder.
fn lone_dollar(input: &str) -> IResult<&str, Segment> {
    value(
        Segment::Literal("$".into()),
        terminated(char('$'), not(char('{'))),
    )
    .parse(input)
}

fn segment(input: &str) -> IResult<&str, Segment> {
    alt((escaped, placeholder, literal_run, lone_dollar)).parse(input)
}

/// Runs the segment parser over a whole template, handing each segment on.
fn scan(input: &str, mut emit: impl FnMut(Segment)) -> Result<()> {
    let mut remaining = input;

    while !remaining.is_empty() {
        let (rest, seg) = segment(remaining).map_err(|e| StackplanError::Parse {
            location: None,
            path: None,
            message: format!(
                "malformed Fn::Sub placeholder at: \"{}\" ({e})",
                remaining.chars().take(20).collect::<String>()
            ),
        })?;
        emit(seg);
        remaining = rest;
    }

    Ok(())
}

/// Splits a `Fn::Sub` template into literal and placeholder segments.
///
/// # Errors
///
/// Returns an error if a `${` is not closed or encloses an invalid name.
pub fn parse_template(input: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    scan(input, |seg| segments.push(seg))?;
    Ok(segments)
}

/// Checks that a template is well formed without keeping its segments.
///
/// # Errors
///
/// Returns the same errors as [`parse_template`].
pub fn check(input: &str) -> Result<()> {
    scan(input, drop)
}

/// Returns only the placeholders of a template, in order.
///
/// # Errors
///
/// Returns an error if the template is malformed.
pub fn placeholders(input: &str) -> Result<Vec<(String, Option<String>)>> {
    let mut found = Vec::new();
    scan(input, |seg| {
        if let Segment::Placeholder { name, attribute } = seg {
            found.push((name, attribute));
        }
    })?;
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_one_literal() {
        let segments = parse_template("hello world").expect("should parse");
        assert_eq!(segments, vec![Segment::Literal("hello world".into())]);
    }

    #[test]
    fn empty_template_has_no_segments() {
        assert!(parse_template("").expect("should parse").is_empty());
    }

    #[test]
    fn placeholders_with_and_without_attribute() {
        let found = placeholders("arn:${AWS::Partition}:s3:::${Bucket}/${Db.Endpoint.Address}")
            .expect("should parse");
        assert_eq!(
            found,
            vec![
                ("AWS::Partition".to_owned(), None),
                ("Bucket".to_owned(), None),
                ("Db".to_owned(), Some("Endpoint.Address".to_owned())),
            ]
        );
    }

    #[test]
    fn escaped_placeholder_is_literal() {
        let segments = parse_template("echo ${!HOME}").expect("should parse");
        assert_eq!(
            segments,
            vec![
                Segment::Literal("echo ".into()),
                Segment::Literal("${HOME}".into()),
            ]
        );
    }

    #[test]
    fn lone_dollar_is_literal() {
        let found = placeholders("costs $5 per ${Unit}").expect("should parse");
        assert_eq!(found, vec![("Unit".to_owned(), None)]);
    }

    #[test]
    fn check_accepts_well_formed_templates() {
        check("arn:${AWS::Partition}:s3:::${Bucket}/${!Literal}").expect("well formed");
        check("").expect("empty is well formed");
    }

    #[test]
    fn unterminated_placeholder_fails() {
        let err = parse_template("value ${Bucket").unwrap_err();
        assert!(err.to_string().contains("malformed Fn::Sub"), "got: {err}");
    }

    #[test]
    fn empty_placeholder_fails() {
        assert!(parse_template("${}").is_err());
        assert!(check("${}").is_err());
    }
}
