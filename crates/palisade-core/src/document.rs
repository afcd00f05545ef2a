//! Parser for request documents and rule fragments.
//!
//! Grammar (commas and `#` comments are ignored like whitespace):
//!
//! ```text
//! document      := ("query" name?)? selection_set
//! fragment      := ("fragment" name | "...") "on" name selection_set
//! selection_set := "{" field* "}"
//! field         := (name ":")? name arguments? selection_set?
//! arguments     := "(" (name ":" value)* ")"
//! value         := string | number | "true" | "false" | "null" | enum
//!                | "[" value* "]" | "{" (name ":" value)* "}"
//! ```

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, tag, take_while, take_while1},
    character::complete::{char, multispace1, none_of},
    combinator::{all_consuming, map, opt, recognize, value},
    multi::many0,
    number::complete::recognize_float,
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};
use serde_json::{Map, Number, Value};

use palisade_contracts::{
    error::{PalisadeError, PalisadeResult},
    selection::{Document, FieldSelection, Fragment, SelectionSet},
};

/// Parse a request document.
pub fn parse_document(source: &str) -> PalisadeResult<Document> {
    match all_consuming(terminated(document, ignored))(source) {
        Ok((_, doc)) => Ok(doc),
        Err(e) => Err(PalisadeError::InvalidDocument {
            reason: e.to_string(),
        }),
    }
}

/// Parse a rule fragment such as `... on User { ownerId }`.
pub fn parse_fragment(source: &str) -> PalisadeResult<Fragment> {
    match all_consuming(terminated(fragment, ignored))(source) {
        Ok((_, (type_condition, selection_set))) => Ok(Fragment {
            type_condition: type_condition.to_string(),
            selection_set,
            source: source.to_string(),
        }),
        Err(e) => Err(PalisadeError::InvalidFragment {
            fragment: source.to_string(),
            reason: e.to_string(),
        }),
    }
}

// ── Lexical helpers ───────────────────────────────────────────────────────────

fn comment(input: &str) -> IResult<&str, ()> {
    value((), pair(char('#'), take_while(|c: char| c != '\n')))(input)
}

fn ignored(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((value((), multispace1), value((), char(',')), comment))),
    )(input)
}

/// `inner`, preceded by ignorable input.
fn token<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    preceded(ignored, inner)
}

fn name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

// ── Values ────────────────────────────────────────────────────────────────────

fn string_value(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(
                none_of("\\\""),
                '\\',
                alt((
                    value("\\", char('\\')),
                    value("\"", char('"')),
                    value("\n", char('n')),
                    value("\t", char('t')),
                )),
            )),
            Option::unwrap_or_default,
        ),
        char('"'),
    )(input)
}

fn number_value(text: &str) -> Value {
    if let Ok(int) = text.parse::<i64>() {
        return Value::from(int);
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn keyword_value(word: &str) -> Value {
    match word {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        other => Value::String(other.to_string()),
    }
}

fn list_value(input: &str) -> IResult<&str, Vec<Value>> {
    delimited(char('['), many0(literal), token(char(']')))(input)
}

fn object_value(input: &str) -> IResult<&str, Map<String, Value>> {
    map(
        delimited(
            char('{'),
            many0(pair(token(name), preceded(token(char(':')), literal))),
            token(char('}')),
        ),
        |entries| {
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect()
        },
    )(input)
}

fn literal(input: &str) -> IResult<&str, Value> {
    token(alt((
        map(string_value, Value::String),
        map(recognize_float, number_value),
        map(list_value, Value::Array),
        map(object_value, Value::Object),
        map(name, keyword_value),
    )))(input)
}

// ── Selections ────────────────────────────────────────────────────────────────

fn arguments(input: &str) -> IResult<&str, Map<String, Value>> {
    map(
        delimited(
            token(char('(')),
            many0(pair(token(name), preceded(token(char(':')), literal))),
            token(char(')')),
        ),
        |entries| {
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect()
        },
    )(input)
}

fn field(input: &str) -> IResult<&str, FieldSelection> {
    let (input, first) = token(name)(input)?;
    let (input, second) = opt(preceded(token(char(':')), token(name)))(input)?;
    let (alias, name) = match second {
        Some(name) => (Some(first.to_string()), name),
        None => (None, first),
    };
    let (input, arguments) = opt(arguments)(input)?;
    let (input, selection_set) = opt(selection_set)(input)?;
    Ok((
        input,
        FieldSelection {
            alias,
            name: name.to_string(),
            arguments: arguments.unwrap_or_default(),
            selection_set: selection_set.unwrap_or_default(),
        },
    ))
}

fn selection_set(input: &str) -> IResult<&str, SelectionSet> {
    map(
        delimited(token(char('{')), many0(field), token(char('}'))),
        SelectionSet::new,
    )(input)
}

fn document(input: &str) -> IResult<&str, Document> {
    map(
        preceded(opt(pair(token(tag("query")), opt(token(name)))), selection_set),
        |selection_set| Document { selection_set },
    )(input)
}

fn fragment(input: &str) -> IResult<&str, (&str, SelectionSet)> {
    let (input, _) = alt((
        value((), pair(token(tag("fragment")), token(name))),
        value((), token(tag("..."))),
    ))(input)?;
    let (input, _) = token(tag("on"))(input)?;
    pair(token(name), selection_set)(input)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_nested_selections_with_aliases_and_arguments() {
        let doc = parse_document(
            r#"query Feed {
                me { id name }
                s: secret(code: "x", limit: 3, ratio: 0.5, flags: [true, null], filter: { kind: OPEN })
            }"#,
        )
        .unwrap();

        let fields = &doc.selection_set.fields;
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "me");
        assert_eq!(fields[0].selection_set.fields.len(), 2);
        assert_eq!(fields[1].alias.as_deref(), Some("s"));
        assert_eq!(fields[1].name, "secret");
        assert_eq!(
            Value::Object(fields[1].arguments.clone()),
            json!({
                "code": "x",
                "limit": 3,
                "ratio": 0.5,
                "flags": [true, null],
                "filter": { "kind": "OPEN" }
            })
        );
    }

    #[test]
    fn anonymous_shorthand_and_commas_are_accepted() {
        let doc = parse_document("{ a, b, # trailing comment\n c }").unwrap();
        let names: Vec<_> = doc.selection_set.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn string_escapes_are_decoded() {
        let doc = parse_document(r#"{ echo(text: "say \"hi\"\n", empty: "") }"#).unwrap();
        let args = &doc.selection_set.fields[0].arguments;
        assert_eq!(args["text"], json!("say \"hi\"\n"));
        assert_eq!(args["empty"], json!(""));
    }

    #[test]
    fn printed_documents_parse_back() {
        let source = r#"{ s: secret(code: "x") me { id } }"#;
        let doc = parse_document(source).unwrap();
        assert_eq!(doc.to_string(), source);
    }

    #[test]
    fn rejects_unbalanced_documents() {
        let err = parse_document("{ me { id }").unwrap_err();
        assert!(matches!(err, PalisadeError::InvalidDocument { .. }));
    }

    #[test]
    fn parses_inline_and_named_fragments() {
        let inline = parse_fragment("... on User { ownerId team { id } }").unwrap();
        assert_eq!(inline.type_condition, "User");
        assert_eq!(inline.selection_set.fields.len(), 2);
        assert_eq!(inline.source, "... on User { ownerId team { id } }");

        let named = parse_fragment("fragment Owner on Post { authorId }").unwrap();
        assert_eq!(named.type_condition, "Post");
        assert_eq!(named.selection_set.fields[0].name, "authorId");
    }

    #[test]
    fn rejects_fragments_without_type_condition() {
        let err = parse_fragment("{ ownerId }").unwrap_err();
        match err {
            PalisadeError::InvalidFragment { fragment, .. } => assert_eq!(fragment, "{ ownerId }"),
            other => panic!("expected InvalidFragment, got {:?}", other),
        }
    }
}
