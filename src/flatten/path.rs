use crate::error::{Error, Result};
use crate::record::Node;
use std::fmt;
use std::str::FromStr;

/// Member route to a sequence, written dotted (`level1.level2`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandPath {
    segments: Vec<String>,
}

impl ExpandPath {
    pub fn parse(path: &str) -> Self {
        ExpandPath {
            segments: path.split('.').map(str::to_string).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Follow the path from `node` to the elements of the sequence it names.
    ///
    /// Member names are matched regardless of tags, so a path may run
    /// through members that are excluded from the walk. Present optionals
    /// are looked through; an absent one is an error, as is a step into
    /// anything but a compound or a final value that is not a sequence.
    pub fn resolve<'n, 'a>(&self, node: &'n Node<'a>) -> Result<&'n [Node<'a>]> {
        let mut current = node;
        for segment in &self.segments {
            current = self.present(current)?;
            if !current.is_compound() {
                return Err(Error::shape(
                    self.to_string(),
                    format!("expected a compound before `{}` but got {}", segment, current.kind()),
                ));
            }
            current = match current.member(segment) {
                Some(member) => &member.node,
                None => {
                    return Err(Error::shape(
                        self.to_string(),
                        format!("no member named `{}`", segment),
                    ))
                }
            };
        }

        match self.present(current)? {
            Node::Sequence(items) => Ok(items.as_slice()),
            other => Err(Error::shape(
                self.to_string(),
                format!("expected a sequence but got {}", other.kind()),
            )),
        }
    }

    fn present<'n, 'a>(&self, mut node: &'n Node<'a>) -> Result<&'n Node<'a>> {
        loop {
            match node {
                Node::Optional(Some(inner)) => node = &**inner,
                Node::Optional(None) => {
                    return Err(Error::shape(self.to_string(), "path runs through an absent value"))
                }
                other => return Ok(other),
            }
        }
    }
}

impl FromStr for ExpandPath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(ExpandPath::parse(s))
    }
}

impl fmt::Display for ExpandPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}
