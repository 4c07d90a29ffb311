//! Argument templates for the external tool commands.
//!
//! Every argument of a configured command is parsed once into literal and variable
//! segments. `#{name}` refers to a variable and `##` is an escaped `#`; a lone `#`
//! that does not open a brace is kept as is.

use std::{collections::HashMap, fmt};

use serde::{
    de::{self, SeqAccess, Visitor},
    Deserialize, Serialize,
};

pub type Vars<'a> = HashMap<&'static str, &'a str>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("Undefined variable '{0}' in '{1}'")]
    UndefinedVar(String, String),

    #[error("Unclosed brace in '{0}' (found open brace at {})", .1+1)]
    UnclosedBrace(String, usize),

    #[error("Variable '{var}' is not available here (available: {})", .allowed.join(", "))]
    UnavailableVar { var: String, allowed: Vec<&'static str> },

    #[error("Empty command")]
    EmptyCommand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Lit(String),
    Var(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl ArgTemplate {
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut lit = String::new();
        let mut chars = raw.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            if c != '#' {
                lit.push(c);
                continue;
            }
            match chars.peek() {
                Some((_, '#')) => {
                    chars.next();
                    lit.push('#');
                }
                Some((_, '{')) => {
                    chars.next();
                    let mut name = String::new();
                    let closed = loop {
                        match chars.next() {
                            Some((_, '}')) => break true,
                            Some((_, ch)) => name.push(ch),
                            None => break false,
                        }
                    };
                    if !closed {
                        return Err(TemplateError::UnclosedBrace(raw.to_owned(), i + 1));
                    }
                    if !lit.is_empty() {
                        segments.push(Segment::Lit(std::mem::take(&mut lit)));
                    }
                    segments.push(Segment::Var(name));
                }
                _ => lit.push('#'),
            }
        }
        if !lit.is_empty() {
            segments.push(Segment::Lit(lit));
        }

        Ok(Self {
            raw: raw.to_owned(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Var(name) => Some(name.as_str()),
            Segment::Lit(_) => None,
        })
    }

    pub fn render(&self, vars: &Vars) -> Result<String, TemplateError> {
        let mut res = String::with_capacity(self.raw.len() * 2);
        for seg in &self.segments {
            match seg {
                Segment::Lit(s) => res += s,
                Segment::Var(name) => {
                    let Some(value) = vars.get(name.as_str()) else {
                        return Err(TemplateError::UndefinedVar(name.clone(), self.raw.clone()));
                    };
                    res += *value;
                }
            }
        }
        Ok(res)
    }
}

/// A program followed by its arguments, each of which may reference variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate(Vec<ArgTemplate>);

impl CommandTemplate {
    pub fn parse<S: AsRef<str>>(argv: &[S]) -> Result<Self, TemplateError> {
        if argv.is_empty() {
            return Err(TemplateError::EmptyCommand);
        }
        argv.iter()
            .map(|a| ArgTemplate::parse(a.as_ref()))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn program(&self) -> &str {
        self.0[0].as_str()
    }

    /// Fails if the template refers to a variable outside `allowed`.
    pub fn ensure_vars_within(&self, allowed: &[&'static str]) -> Result<(), TemplateError> {
        let unknown = self
            .0
            .iter()
            .flat_map(ArgTemplate::variables)
            .find(|v| !allowed.iter().any(|a| a == v));
        match unknown {
            Some(var) => Err(TemplateError::UnavailableVar {
                var: var.to_owned(),
                allowed: allowed.to_vec(),
            }),
            None => Ok(()),
        }
    }

    pub fn render(&self, vars: &Vars) -> Result<Vec<String>, TemplateError> {
        self.0.iter().map(|a| a.render(vars)).collect()
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let args: Vec<_> = self.0.iter().map(ArgTemplate::as_str).collect();
        write!(f, "{}", args.join(" "))
    }
}

impl Serialize for CommandTemplate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.0.iter().map(ArgTemplate::as_str))
    }
}

impl<'de> Deserialize<'de> for CommandTemplate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct CommandTemplateVisitor;

        impl<'de> Visitor<'de> for CommandTemplateVisitor {
            type Value = CommandTemplate;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a non-empty array of argument strings")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut argv: Vec<String> = Vec::new();
                while let Some(arg) = seq.next_element()? {
                    argv.push(arg);
                }
                CommandTemplate::parse(&argv).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_seq(CommandTemplateVisitor)
    }
}
