//! tasktree is a library for drawing the task trees recorded by a parallel
//! branch-and-bound solver.
//!
//! # Summary
//!
//! The solver logs, for every task, three timestamps (created, started,
//! finished) and, for every task that splits, the labels of its two children.
//! tasktree reads such a trace, recovers the binary tree it implies, and draws
//! every task as two segments: the time it spent waiting in the queue and the
//! time it spent being worked on.
//!
//! The stages are, in order:
//!
//! 1. [trace::read] parses the trace text into [trace::Trace],
//! 2. [trace::Trace::root] infers the root label,
//! 3. [tree::build] expands the root into a doubled [tree::Skeleton],
//! 4. [duration::derive] attaches waiting and active durations, and
//! 5. [render::render] writes the picture.
//!
//! [reconstruct] runs stages 2 through 4.
//!
//! The [metadata] and [timings] modules handle the companion run logs, which
//! record worker counts, problem sizes and solve times.
pub mod printer {
    //! A printer for [Label]s
    //!
    //! (The printer is the inverse of the [parser](super::parser); labels are
    //! printed without whitespace, escaping any inside strings as `\u{..}`, so
    //! that they stay a single trace token.)
    use itertools::Itertools;

    use super::parser::Label;

    pub fn print(label: &Label) -> String {
        match label {
            Label::Int(i) => i.to_string(),
            Label::Str(s) => quote(s),
            Label::Tuple(v) if v.len() == 1 => format!("({},)", print(&v[0])),
            Label::Tuple(v) => format!("({})", v.iter().map(print).join(",")),
        }
    }

    fn quote(s: &str) -> String {
        let mut q = String::with_capacity(s.len() + 2);
        q.push('\'');
        for c in s.chars() {
            match c {
                '\\' => q.push_str("\\\\"),
                '\'' => q.push_str("\\'"),
                '\n' => q.push_str("\\n"),
                '\r' => q.push_str("\\r"),
                '\t' => q.push_str("\\t"),
                c if c.is_whitespace() => q.push_str(&format!("\\u{{{:x}}}", c as u32)),
                c => q.push(c),
            }
        }
        q.push('\'');
        q
    }

}

pub mod parser {
    //! The parser for [Label] literals
    //!
    //! # Summary
    //!
    //! Labels are small literals:
    //!
    //! * integers ::= **-**? *digit*+
    //! * strings ::= **'** *char** **'** or **"** *char** **"**, with backslash escapes
    //! * tuples ::= **(** **)** | **(** *label* **,** **)** | **(** *label* (**,** *label*)+ **,**? **)**
    //!
    //! A parenthesized label without a comma, `(x)`, is just `x`.
    //!
    //! Anything else is rejected; nothing is evaluated.
    use std::fmt;
    use std::str::FromStr;

    use derive_more::From;
    use logos::Logos;
    use pomelo::pomelo;

    /// Labels identify solver tasks.
    #[derive(Clone, Debug, Eq, From, Hash, Ord, PartialEq, PartialOrd)]
    #[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
    pub enum Label {
        Int(i64),
        Str(String),
        Tuple(Vec<Label>),
    }

    impl fmt::Display for Label {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&crate::printer::print(self))
        }
    }

    /// Strip the quotes from a string token and resolve its escapes.
    pub fn unescape(s: &str) -> String {
        let body = &s[1..s.len() - 1];
        let mut out = String::with_capacity(body.len());
        let mut chars = body.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some('0') => out.push('\0'),
                Some('u') => {
                    let rest = chars.as_str();
                    let escaped = rest
                        .strip_prefix('{')
                        .and_then(|r| r.split_once('}'))
                        .and_then(|(hex, tail)| Some((char::from_u32(u32::from_str_radix(hex, 16).ok()?)?, tail)));
                    match escaped {
                        Some((c, tail)) => {
                            out.push(c);
                            chars = tail.chars();
                        },
                        None => out.push('u'),
                    }
                },
                Some(c) => out.push(c),
                None => out.push('\\'),
            }
        }
        out
    }

    pomelo! {
        %module literal;
        %include {
            use super::{Label, unescape};
            use logos::{Logos};
        }
        %token #[derive(Copy, Clone, Debug, Logos, PartialEq)] pub enum Token<'s> {};
        %type #[error] #[regex(r"[ \t\r\n\f]+", logos::skip)] Error;
        %type #[token("(")] Lparen;
        %type #[token(")")] Rparen;
        %type #[token(",")] Comma;
        %type #[regex("-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())] Int i64;
        %type #[regex(r#"'([^'\\\n]|\\.)*'"#)] #[regex(r#""([^"\\\n]|\\.)*""#)] Str &'s str;
        %type start Label;
        %type label Label;
        %type elems Vec<Label>;

        start ::= label;

        label ::= Int(i) { Label::Int(i) };
        label ::= Str(s) { Label::Str(unescape(s)) };
        label ::= Lparen Rparen { Label::Tuple(vec![]) };
        label ::= Lparen label(l) Rparen { l };
        label ::= Lparen label(l) Comma Rparen { Label::Tuple(vec![l]) };
        label ::= Lparen elems(v) Rparen { Label::Tuple(v) };
        label ::= Lparen elems(v) Comma Rparen { Label::Tuple(v) };

        elems ::= label(a) Comma label(b) { vec![a, b] };
        elems ::= elems(v) Comma label(b) {
            let mut v = v;
            v.push(b);
            v
        };
    }

    /// The [pomelo!]-generated label parser
    pub use literal::Parser;

    /// The [pomelo!]-generated label lexer.
    ///
    /// To use, please bring the [Logos] trait into scope like so:
    /// ```ignore
    /// use logos::Logos;
    /// ```
    pub use literal::Token;

    /// A label literal that could not be parsed.
    #[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
    #[error("invalid label {text:?} at byte {offset}")]
    pub struct LabelError {
        pub offset: usize,
        pub text: String,
    }

    pub fn parse_label(s: &str) -> Result<Label, LabelError> {
        let mut lex = Token::lexer(s);
        let mut p = Parser::new();
        while let Some(tk) = lex.next() {
            p.parse(tk).map_err(|_| LabelError{
                offset: lex.span().start,
                text: s.to_string(),
            })?;
        }
        p.end_of_input().map_err(|_| LabelError{
            offset: s.len(),
            text: s.to_string(),
        })
    }

    impl FromStr for Label {
        type Err = LabelError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            parse_label(s)
        }
    }

    #[cfg(test)]
    mod test {
        use pretty_assertions::assert_eq;

        use super::{Label, parse_label};

        fn tuple(v: Vec<Label>) -> Label {
            Label::Tuple(v)
        }

        #[test]
        fn parses_solver_labels() {
            assert_eq!(parse_label("()").unwrap(), tuple(vec![]));
            assert_eq!(parse_label("(0,)").unwrap(), tuple(vec![Label::Int(0)]));
            assert_eq!(
                parse_label("(0,(1,1,2,-1))").unwrap(),
                tuple(vec![
                    Label::Int(0),
                    tuple(vec![Label::Int(1), Label::Int(1), Label::Int(2), Label::Int(-1)]),
                ])
            );
            assert_eq!(
                parse_label("(0,(1,-1),3,(2,1))").unwrap(),
                tuple(vec![
                    Label::Int(0),
                    tuple(vec![Label::Int(1), Label::Int(-1)]),
                    Label::Int(3),
                    tuple(vec![Label::Int(2), Label::Int(1)]),
                ])
            );
        }

        #[test]
        fn parses_strings_and_grouping() {
            assert_eq!(parse_label("'a'").unwrap(), Label::Str("a".into()));
            assert_eq!(parse_label(r#""b\"c""#).unwrap(), Label::Str("b\"c".into()));
            assert_eq!(parse_label(r"'a\u{20}b\u{3000}'").unwrap(), Label::Str("a b\u{3000}".into()));
            assert_eq!(parse_label(r"'\u{zz}'").unwrap(), Label::Str("u{zz}".into()));
            assert_eq!(parse_label("(7)").unwrap(), Label::Int(7));
            assert_eq!(parse_label("((1,2))").unwrap(), tuple(vec![Label::Int(1), Label::Int(2)]));
            assert_eq!(parse_label("(1,'x',)").unwrap(), tuple(vec![Label::Int(1), Label::Str("x".into())]));
        }

        #[test]
        fn rejects_everything_else() {
            for bad in ["", "(", ")", "(,)", "(1,,2)", "1+1", "__import__('os')", "(1 2)", "[1]", "99999999999999999999", "'open"] {
                assert!(parse_label(bad).is_err(), "accepted {bad:?}");
            }
        }

        #[test]
        fn same_text_same_identity() {
            let a: Label = "(0,(1,1))".parse().unwrap();
            let b: Label = "(0,(1,1))".parse().unwrap();
            assert_eq!(a, b);
            assert_eq!(a.to_string(), "(0,(1,1))");
        }
    }
}

pub mod error;
pub mod trace;
pub mod tree;
pub mod duration;
pub mod render;
pub mod metadata;
pub mod timings;

pub use error::{Error, ErrorKind, OrErrExt};

use tracing::instrument;

/// Recover the timed tree recorded by `trace`.
#[instrument(skip(trace))]
pub fn reconstruct(trace: &trace::Trace) -> Result<duration::TimedTree, Error> {
    let root = trace.root()?;
    let skeleton = tree::build(&root, &trace.edges)?;
    duration::derive(skeleton, &trace.timestamps)
}
