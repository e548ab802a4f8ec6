//! Namespace-aware locator evaluation over a parsed XML document.
//!
//! Supports the path subset used by mapping rules: absolute, descendant and
//! document-relative paths, prefixed name tests, `*`, `.`, `..`, a terminal
//! `text()` or `@attribute` step, and simple positional or equality predicates.

use std::collections::BTreeMap;

use roxmltree::{Document, Node, ParsingOptions};
use thiserror::Error;

use crate::domain::config::NamespaceBinding;
use crate::domain::error::LocatorError;
use crate::engine::DocumentQuery;

#[derive(Debug, Error)]
#[error("failed to parse xml document: {0}")]
pub struct DocumentParseError(#[from] roxmltree::Error);

/// Parsed XML document plus the namespace bindings used to resolve prefixes.
pub struct XmlDocument<'input> {
    tree: Document<'input>,
    namespaces: BTreeMap<String, String>,
}

impl<'input> XmlDocument<'input> {
    pub fn parse(
        text: &'input str,
        bindings: &[NamespaceBinding],
    ) -> Result<Self, DocumentParseError> {
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let tree = Document::parse_with_options(text, options)?;
        let namespaces = bindings
            .iter()
            .map(|binding| (binding.prefix.clone(), binding.uri.clone()))
            .collect();
        Ok(Self { tree, namespaces })
    }

    fn select(&self, locator: &str) -> Result<Vec<String>, LocatorError> {
        let path = LocatorPath::parse(locator, &self.namespaces)?;
        let mut context = vec![self.tree.root()];

        for (index, step) in path.steps.iter().enumerate() {
            let is_last = index + 1 == path.steps.len();
            if step.descendant {
                context = document_order(
                    context
                        .iter()
                        .flat_map(|node| node.descendants())
                        .collect(),
                );
            }

            match &step.test {
                NodeTest::Text | NodeTest::Attribute(_) if !is_last => {
                    return Err(LocatorError::new(
                        locator,
                        "text() and attribute steps must be last",
                    ));
                }
                NodeTest::Text => {
                    return Ok(context
                        .iter()
                        .flat_map(|node| node.children().filter(|child| child.is_text()))
                        .map(|text| text.text().unwrap_or_default().to_string())
                        .collect());
                }
                NodeTest::Attribute(name) => {
                    return Ok(context
                        .iter()
                        .flat_map(|node| node.attributes())
                        .filter(|attribute| {
                            name.matches(attribute.namespace(), attribute.name())
                        })
                        .map(|attribute| attribute.value().to_string())
                        .collect());
                }
                _ => {}
            }

            let mut next = Vec::new();
            for node in &context {
                let candidates = step.test.apply(*node);
                next.extend(apply_predicates(candidates, &step.predicates));
            }
            context = document_order(next);
        }

        Ok(context.iter().map(|node| string_value(*node)).collect())
    }
}

impl DocumentQuery for XmlDocument<'_> {
    fn evaluate(&self, locator: &str) -> Result<Vec<String>, LocatorError> {
        self.select(locator)
    }
}

fn document_order<'a, 'input>(mut nodes: Vec<Node<'a, 'input>>) -> Vec<Node<'a, 'input>> {
    nodes.sort_by_key(|node| node.id().get());
    nodes.dedup_by_key(|node| node.id());
    nodes
}

fn string_value(node: Node<'_, '_>) -> String {
    if node.is_text() {
        return node.text().unwrap_or_default().to_string();
    }
    node.descendants()
        .filter(|descendant| descendant.is_text())
        .filter_map(|text| text.text())
        .collect()
}

fn apply_predicates<'a, 'input>(
    mut candidates: Vec<Node<'a, 'input>>,
    predicates: &[Predicate],
) -> Vec<Node<'a, 'input>> {
    for predicate in predicates {
        candidates = match predicate {
            Predicate::Position(position) => candidates
                .into_iter()
                .nth(position.wrapping_sub(1))
                .into_iter()
                .collect(),
            Predicate::Last => candidates.pop().into_iter().collect(),
            other => candidates
                .into_iter()
                .filter(|node| other.holds(*node))
                .collect(),
        };
    }
    candidates
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct QualifiedName {
    namespace: Option<String>,
    local: String,
}

impl QualifiedName {
    fn parse(
        raw: &str,
        locator: &str,
        namespaces: &BTreeMap<String, String>,
    ) -> Result<Self, LocatorError> {
        let (prefix, local) = match raw.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, raw),
        };
        if !is_name(local) {
            return Err(LocatorError::new(locator, format!("invalid name `{raw}`")));
        }
        let namespace = match prefix {
            Some(prefix) => Some(namespaces.get(prefix).cloned().ok_or_else(|| {
                LocatorError::new(locator, format!("unbound namespace prefix `{prefix}`"))
            })?),
            None => None,
        };
        Ok(Self {
            namespace,
            local: local.to_string(),
        })
    }

    fn matches(&self, namespace: Option<&str>, local: &str) -> bool {
        self.local == local && self.namespace.as_deref() == namespace
    }

    fn matches_element(&self, node: Node<'_, '_>) -> bool {
        node.is_element() && self.matches(node.tag_name().namespace(), node.tag_name().name())
    }
}

fn is_name(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeTest {
    Name(QualifiedName),
    AnyElement,
    SelfNode,
    Parent,
    Text,
    Attribute(QualifiedName),
}

impl NodeTest {
    fn apply<'a, 'input>(&self, node: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
        match self {
            Self::Name(name) => node
                .children()
                .filter(|child| name.matches_element(*child))
                .collect(),
            Self::AnyElement => node.children().filter(|child| child.is_element()).collect(),
            Self::SelfNode => vec![node],
            Self::Parent => node.parent().into_iter().collect(),
            Self::Text | Self::Attribute(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Position(usize),
    Last,
    HasAttribute(QualifiedName),
    AttributeEquals(QualifiedName, String),
    HasChild(QualifiedName),
    ChildEquals(QualifiedName, String),
}

impl Predicate {
    fn parse(
        body: &str,
        locator: &str,
        namespaces: &BTreeMap<String, String>,
    ) -> Result<Self, LocatorError> {
        let body = body.trim();
        if !body.is_empty() && body.bytes().all(|byte| byte.is_ascii_digit()) {
            let position = body
                .parse::<usize>()
                .map_err(|error| LocatorError::new(locator, format!("invalid position: {error}")))?;
            return Ok(Self::Position(position));
        }
        if body == "last()" {
            return Ok(Self::Last);
        }

        let (subject, literal) = match split_outside_quotes(body, '=') {
            Some((subject, literal)) => (subject.trim(), Some(literal)),
            None => (body, None),
        };
        if subject.contains('(') {
            return Err(LocatorError::unsupported(
                locator,
                format!("function call in predicate `[{body}]`"),
            ));
        }
        let has_operator = subject.contains(['<', '>', '!'])
            || subject.contains(" and ")
            || subject.contains(" or ");
        if has_operator {
            return Err(LocatorError::unsupported(
                locator,
                format!("operator in predicate `[{body}]`"),
            ));
        }
        let literal = literal
            .map(|literal| parse_literal(literal, locator))
            .transpose()?;

        if let Some(attribute) = subject.strip_prefix('@') {
            let name = QualifiedName::parse(attribute, locator, namespaces)?;
            return Ok(match literal {
                Some(value) => Self::AttributeEquals(name, value),
                None => Self::HasAttribute(name),
            });
        }

        let name = QualifiedName::parse(subject, locator, namespaces)?;
        Ok(match literal {
            Some(value) => Self::ChildEquals(name, value),
            None => Self::HasChild(name),
        })
    }

    fn holds(&self, node: Node<'_, '_>) -> bool {
        match self {
            Self::Position(_) | Self::Last => true,
            Self::HasAttribute(name) => node
                .attributes()
                .any(|attribute| name.matches(attribute.namespace(), attribute.name())),
            Self::AttributeEquals(name, value) => node.attributes().any(|attribute| {
                name.matches(attribute.namespace(), attribute.name()) && attribute.value() == value
            }),
            Self::HasChild(name) => node.children().any(|child| name.matches_element(child)),
            Self::ChildEquals(name, value) => node
                .children()
                .any(|child| name.matches_element(child) && string_value(child) == *value),
        }
    }
}

fn parse_literal(raw: &str, locator: &str) -> Result<String, LocatorError> {
    let raw = raw.trim();
    let quoted = raw.len() >= 2
        && ((raw.starts_with('\'') && raw.ends_with('\''))
            || (raw.starts_with('"') && raw.ends_with('"')));
    if !quoted {
        return Err(LocatorError::new(
            locator,
            format!("predicate value `{raw}` must be a quoted string"),
        ));
    }
    Ok(raw[1..raw.len() - 1].to_string())
}

fn split_outside_quotes(input: &str, separator: char) -> Option<(&str, &str)> {
    let mut quote = None;
    for (index, c) in input.char_indices() {
        match quote {
            Some(open) if c == open => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == separator => {
                return Some((&input[..index], &input[index + c.len_utf8()..]));
            }
            None => {}
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    descendant: bool,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LocatorPath {
    steps: Vec<Step>,
}

impl LocatorPath {
    fn parse(locator: &str, namespaces: &BTreeMap<String, String>) -> Result<Self, LocatorError> {
        let trimmed = locator.trim();
        if trimmed.is_empty() {
            return Err(LocatorError::new(locator, "locator must not be empty"));
        }
        if split_outside_quotes(trimmed, '|').is_some() {
            return Err(LocatorError::unsupported(locator, "union of paths"));
        }

        let mut steps = Vec::new();
        let mut rest = trimmed;
        let mut descendant = false;
        if let Some(stripped) = rest.strip_prefix("//") {
            descendant = true;
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        }

        for raw in split_steps(rest, locator)? {
            if raw.is_empty() {
                if descendant {
                    return Err(LocatorError::new(locator, "unexpected `/` sequence"));
                }
                descendant = true;
                continue;
            }
            steps.push(Self::parse_step(raw, descendant, locator, namespaces)?);
            descendant = false;
        }

        if descendant || steps.is_empty() {
            return Err(LocatorError::new(locator, "locator must end with a step"));
        }
        Ok(Self { steps })
    }

    fn parse_step(
        raw: &str,
        descendant: bool,
        locator: &str,
        namespaces: &BTreeMap<String, String>,
    ) -> Result<Step, LocatorError> {
        let (head, mut tail) = match raw.find('[') {
            Some(index) => (&raw[..index], &raw[index..]),
            None => (raw, ""),
        };

        let head = head.trim();
        if head.contains("::") {
            return Err(LocatorError::unsupported(locator, format!("axis step `{head}`")));
        }
        if head.contains('(') && head != "text()" {
            return Err(LocatorError::unsupported(
                locator,
                format!("function step `{head}`"),
            ));
        }

        let test = match head {
            "*" => NodeTest::AnyElement,
            "." => NodeTest::SelfNode,
            ".." => NodeTest::Parent,
            "text()" => NodeTest::Text,
            name => match name.strip_prefix('@') {
                Some(attribute) => {
                    NodeTest::Attribute(QualifiedName::parse(attribute, locator, namespaces)?)
                }
                None => NodeTest::Name(QualifiedName::parse(name, locator, namespaces)?),
            },
        };

        let mut predicates = Vec::new();
        while !tail.is_empty() {
            let Some(inner) = tail.strip_prefix('[') else {
                return Err(LocatorError::new(
                    locator,
                    format!("unexpected `{tail}` after step"),
                ));
            };
            let Some((body, remaining)) = split_outside_quotes(inner, ']') else {
                return Err(LocatorError::new(locator, "unterminated predicate"));
            };
            predicates.push(Predicate::parse(body, locator, namespaces)?);
            tail = remaining;
        }

        if !predicates.is_empty() && matches!(test, NodeTest::Text | NodeTest::Attribute(_)) {
            return Err(LocatorError::new(
                locator,
                "predicates are not supported on text() or attribute steps",
            ));
        }

        Ok(Step {
            descendant,
            test,
            predicates,
        })
    }
}

/// Splits on `/` outside predicates and quoted literals.
fn split_steps<'a>(input: &'a str, locator: &str) -> Result<Vec<&'a str>, LocatorError> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote = None;
    let mut start = 0usize;

    for (index, c) in input.char_indices() {
        match (quote, c) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| LocatorError::new(locator, "unbalanced `]`"))?;
            }
            (None, '/') if depth == 0 => {
                parts.push(&input[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }

    if quote.is_some() || depth != 0 {
        return Err(LocatorError::new(locator, "unterminated predicate or literal"));
    }
    parts.push(&input[start..]);
    Ok(parts)
}
