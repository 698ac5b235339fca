/*!
# Sniffer

Drives the [`Evaluator`] from an XML document in a single forward pass.

The sniffer keeps one frame per open element. A frame remembers the forest
nodes that accepted the element (its *entries*, whose children are matched
against the element's content), how many same-named children it has seen,
its location path and the comparisons waiting for its string value.

```
use xsniff::query::QuerySet;
use xsniff::sniffer::{SniffOptions, sniff};

let mut set = QuerySet::new();
set.add_str("/a/b").unwrap();
set.add_str("count(/a/b)").unwrap();

let results = sniff(&set, "<a><b/><b/></a>", &SniffOptions::default()).unwrap();
assert_eq!(results.get(0).unwrap(), ["/a[1]/b[1]", "/a[1]/b[2]"]);
assert_eq!(results.get(1).unwrap(), ["2"]);
```
*/
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{self, Display};
use std::num::NonZeroUsize;

use log::{trace, warn};
use serde::Serialize;

use crate::engine::{Context, Evaluator, Interrupt, LogObserver, Observer};
use crate::event::Event;
use crate::model::{Axis, ExpandedName, Forest, ForestError, NodeId, NodeKind, Step};
use crate::query::{QuerySet, XML_NAMESPACE, XPath};
use crate::tokenizer::{Attribute, LexError, XmlToken, tokenize};

/// Configuration of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SniffOptions {
    /// Stop after this many results were committed
    pub limit: Option<NonZeroUsize>,
}

impl SniffOptions {
    /// Options stopping the pass after `limit` results.
    #[must_use]
    pub const fn with_limit(limit: NonZeroUsize) -> Self {
        Self { limit: Some(limit) }
    }
}

/// How a pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The whole document was read.
    Completed,
    /// The result limit was reached before the end of the document.
    Stopped,
}

/// The ordered results of every query of a [`QuerySet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Results {
    values: Vec<Vec<String>>,
    outcome: Outcome,
}

impl Results {
    /// Results of the query at `index`, in document order.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&[String]> {
        self.values.get(index).map(Vec::as_slice)
    }

    /// Results of every query, in the order the queries were added.
    #[must_use]
    pub fn values(&self) -> &[Vec<String>] {
        &self.values
    }

    /// Consume into the per-query results.
    #[must_use]
    pub fn into_values(self) -> Vec<Vec<String>> {
        self.values
    }

    /// How the pass ended.
    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        self.outcome
    }
}

/// Errors that abort a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SniffError {
    /// Malformed markup
    Lex(LexError),
    /// The forest the queries were compiled into is malformed
    Forest(ForestError),
    /// An end tag that does not close the innermost open element
    Mismatched {
        /// Name of the innermost open element, if any
        expected: Option<String>,
        /// Name in the end tag
        found: String,
        /// Byte offset of the end tag
        offset: usize,
    },
    /// The document ended with an element still open
    Unclosed(String),
    /// A prefix with no namespace declaration in scope
    UnknownPrefix {
        /// The undeclared prefix
        prefix: String,
        /// Byte offset of the tag using it
        offset: usize,
    },
}

impl Error for SniffError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Lex(err) => Some(err),
            Self::Forest(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for SniffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lex(err) => write!(f, "{err}"),
            Self::Forest(err) => write!(f, "{err}"),
            Self::Mismatched { expected: Some(expected), found, offset } => {
                write!(f, "expected </{expected}> at byte {offset}, found </{found}>")
            }
            Self::Mismatched { expected: None, found, offset } => {
                write!(f, "unexpected </{found}> at byte {offset}")
            }
            Self::Unclosed(name) => write!(f, "element <{name}> is never closed"),
            Self::UnknownPrefix { prefix, offset } => {
                write!(f, "undeclared namespace prefix {prefix:?} at byte {offset}")
            }
        }
    }
}

impl From<LexError> for SniffError {
    fn from(err: LexError) -> Self {
        Self::Lex(err)
    }
}

impl From<ForestError> for SniffError {
    fn from(err: ForestError) -> Self {
        Self::Forest(err)
    }
}

/// Why event delivery stopped before the end of the document.
enum Abort {
    Stopped,
    Failed(SniffError),
}

impl From<Interrupt> for Abort {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Exhausted => Self::Stopped,
            Interrupt::Forest(err) => Self::Failed(err.into()),
        }
    }
}

impl From<SniffError> for Abort {
    fn from(err: SniffError) -> Self {
        Self::Failed(err)
    }
}

impl From<LexError> for Abort {
    fn from(err: LexError) -> Self {
        Self::Failed(err.into())
    }
}

/// A comparison on an element, decided once the element's string value is
/// complete.
#[derive(Debug)]
struct PendingCompare {
    node: NodeId,
    context: Context,
    value: String,
}

/// State of one open element (or of the document itself, at the bottom of
/// the stack).
#[derive(Debug, Default)]
struct Frame {
    scope: u64,
    qname: String,
    name: Option<ExpandedName>,
    location: String,
    entries: Vec<NodeId>,
    matched: Vec<NodeId>,
    collectors: Vec<NodeId>,
    compares: Vec<PendingCompare>,
    siblings: HashMap<ExpandedName, usize>,
}

/// One streaming pass over one document.
#[derive(Debug)]
pub struct Sniffer<'f, O: Observer = LogObserver> {
    forest: &'f Forest,
    root: NodeId,
    evaluator: Evaluator<'f, O>,
    frames: Vec<Frame>,
    namespaces: Vec<Vec<(String, String)>>,
}

impl<'f> Sniffer<'f> {
    /// Constructs a sniffer for the tree instance at `root`.
    #[must_use]
    pub fn new(forest: &'f Forest, root: NodeId, options: &SniffOptions) -> Self {
        Self::with_observer(forest, root, options, LogObserver)
    }
}

impl<'f, O: Observer> Sniffer<'f, O> {
    /// Constructs a sniffer whose evaluator reports to `observer`.
    pub fn with_observer(
        forest: &'f Forest,
        root: NodeId,
        options: &SniffOptions,
        observer: O,
    ) -> Self {
        Self {
            forest,
            root,
            evaluator: Evaluator::with_observer(forest, root, options.limit, observer),
            frames: Vec::new(),
            namespaces: Vec::new(),
        }
    }

    /// The evaluator holding the pass state.
    #[must_use]
    pub const fn evaluator(&self) -> &Evaluator<'f, O> {
        &self.evaluator
    }

    /// Results of a compiled query, in document order.
    ///
    /// # Errors
    ///
    /// Returns a [`ForestError`] if the query does not belong to this
    /// sniffer's forest.
    pub fn results(&self, xpath: &XPath) -> Result<Vec<String>, ForestError> {
        self.evaluator.results(xpath)
    }

    /// Read a whole document, delivering every event to the evaluator.
    ///
    /// # Errors
    ///
    /// Returns a [`SniffError`] on malformed markup or a malformed forest.
    /// Reaching the result limit is not an error: it yields
    /// [`Outcome::Stopped`].
    pub fn run(&mut self, input: &str) -> Result<Outcome, SniffError> {
        match self.feed(input) {
            Ok(()) => Ok(Outcome::Completed),
            Err(Abort::Stopped) => {
                warn!("stopped after {} results", self.evaluator.committed());
                Ok(Outcome::Stopped)
            }
            Err(Abort::Failed(err)) => Err(err),
        }
    }

    fn feed(&mut self, input: &str) -> Result<(), Abort> {
        let scope = self.evaluator.advance();
        trace!("{scope}: {}", Event::Document);
        self.frames = vec![Frame { scope, entries: vec![self.root], ..Frame::default() }];
        self.namespaces.clear();

        let mut lexer = tokenize(input);
        loop {
            let offset = lexer.offset();
            match lexer.next_token()? {
                XmlToken::StartTag { name, attributes, self_closing } => {
                    self.open(name, &attributes, offset)?;
                    if self_closing {
                        self.close(name, offset)?;
                    }
                }
                XmlToken::EndTag { name } => self.close(name, offset)?,
                XmlToken::Text(text) => self.text(&text)?,
                XmlToken::Eof => break,
            }
        }

        match self.frames.pop() {
            Some(frame) if !self.frames.is_empty() => Err(SniffError::Unclosed(frame.qname).into()),
            _ => Ok(()),
        }
    }

    /// Namespace URI bound to `prefix` (`""` for the default namespace).
    fn lookup(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        self.namespaces
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|(bound, _)| bound == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    fn expand(&self, qname: &str, element: bool, offset: usize) -> Result<ExpandedName, SniffError> {
        match qname.split_once(':') {
            Some((prefix, local)) => match self.lookup(prefix) {
                Some(uri) => Ok(ExpandedName::new(Some(uri.to_string()), local)),
                None => Err(SniffError::UnknownPrefix { prefix: prefix.to_string(), offset }),
            },
            None => {
                let namespace = if element { self.lookup("") } else { None };
                // `xmlns=""` undeclares the default namespace
                let namespace = namespace.filter(|uri| !uri.is_empty()).map(str::to_string);
                Ok(ExpandedName::new(namespace, qname))
            }
        }
    }

    /// Candidates for an event: matching children of the current frame's
    /// entries, and matching descendant-axis children of every open frame.
    /// Each node appears once, with the entry it was reached from.
    fn candidates(
        &self,
        current: &[NodeId],
        accept: impl Fn(&Step) -> bool,
    ) -> Vec<(NodeId, NodeId)> {
        let forest = self.forest;
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        let mut scan = |entry: NodeId, deep: bool| {
            for &child in forest.node(entry).children() {
                if let NodeKind::Step(step) = forest.node(child).kind()
                    && (step.axis == Axis::Descendant) == deep
                    && accept(step)
                    && seen.insert(child)
                {
                    found.push((entry, child));
                }
            }
        };
        for &entry in current {
            scan(entry, false);
        }
        for frame in &self.frames {
            for &entry in &frame.entries {
                scan(entry, true);
            }
        }
        found
    }

    /// `node` accepted `event`: record it in the frame and run its
    /// constraints.
    fn accept(
        &mut self,
        frame: &mut Frame,
        context: Context,
        event: &Event<'_>,
        node: NodeId,
    ) -> Result<(), Abort> {
        let forest = self.forest;
        let is_element = matches!(event, Event::Element { .. });
        if is_element {
            frame.matched.push(node);
            if matches!(forest.node(node).kind(), NodeKind::Step(_) | NodeKind::Position(_)) {
                frame.entries.push(node);
            }
        }

        let local = Context::new(context.scope, node);
        for &constraint in forest.node(node).constraints() {
            match forest.node(constraint).kind() {
                NodeKind::Position(_) => {
                    if self.evaluator.hit(local, event, constraint)? {
                        self.accept(frame, local, event, constraint)?;
                    }
                }
                NodeKind::Compare(comparison) => {
                    if is_element {
                        frame.compares.push(PendingCompare {
                            node: constraint,
                            context: local,
                            value: String::new(),
                        });
                    } else if comparison.test(event.result()) {
                        self.evaluator.hit(local, event, constraint)?;
                    }
                }
                NodeKind::Function(function) => {
                    let accepted = self.evaluator.hit(local, event, constraint)?;
                    if accepted && is_element && function.collects_text() {
                        frame.collectors.push(constraint);
                    }
                }
                NodeKind::Root | NodeKind::Step(_) | NodeKind::Predicate(_) => {}
            }
        }
        Ok(())
    }

    fn open(&mut self, qname: &str, attributes: &[Attribute<'_>], offset: usize) -> Result<(), Abort> {
        let bindings = attributes
            .iter()
            .filter_map(|attribute| {
                let prefix = if attribute.name == "xmlns" {
                    ""
                } else {
                    attribute.name.strip_prefix("xmlns:")?
                };
                Some((prefix.to_string(), attribute.value.to_string()))
            })
            .collect();
        self.namespaces.push(bindings);
        let name = self.expand(qname, true, offset)?;

        let Some(parent) = self.frames.last_mut() else {
            return Err(SniffError::Unclosed(qname.to_string()).into());
        };
        let position = {
            let count = parent.siblings.entry(name.clone()).or_insert(0);
            *count += 1;
            *count
        };
        let location = format!("{}/{qname}[{position}]", parent.location);
        let (parent_scope, parent_entries) = (parent.scope, parent.entries.clone());

        let scope = self.evaluator.advance();
        let event = Event::Element { name: &name, qname, position, location: &location };
        trace!("{scope}: {event}");

        let mut frame = Frame {
            scope,
            qname: qname.to_string(),
            location: location.clone(),
            ..Frame::default()
        };
        for (entry, node) in self.candidates(&parent_entries, |step| step.selects_element(&name)) {
            let context = Context::new(parent_scope, entry);
            if self.evaluator.hit(context, &event, node)? {
                self.accept(&mut frame, context, &event, node)?;
            }
        }

        let attribute_entries: Vec<NodeId> = frame
            .entries
            .iter()
            .copied()
            .filter(|&entry| self.forest.node(entry).has_attribute_child())
            .collect();
        if !attribute_entries.is_empty() {
            for attribute in attributes {
                if attribute.name == "xmlns" || attribute.name.starts_with("xmlns:") {
                    continue;
                }
                self.attribute(&mut frame, &attribute_entries, attribute, offset)?;
            }
        }

        frame.name = Some(name);
        self.frames.push(frame);
        Ok(())
    }

    fn attribute(
        &mut self,
        frame: &mut Frame,
        entries: &[NodeId],
        attribute: &Attribute<'_>,
        offset: usize,
    ) -> Result<(), Abort> {
        let forest = self.forest;
        let name = self.expand(attribute.name, false, offset)?;
        let order = self.evaluator.advance();
        let event = Event::Attribute { name: &name, qname: attribute.name, value: &attribute.value };
        trace!("{order}: {event}");

        for &entry in entries {
            for &child in forest.node(entry).children() {
                let NodeKind::Step(step) = forest.node(child).kind() else { continue };
                if !step.selects_attribute(&name) {
                    continue;
                }
                let context = Context::new(frame.scope, entry);
                if self.evaluator.hit(context, &event, child)? {
                    self.accept(frame, context, &event, child)?;
                }
            }
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), Abort> {
        // character data outside the document element
        if self.frames.len() < 2 {
            return Ok(());
        }
        let order = self.evaluator.advance();
        let event = Event::Text(text);
        trace!("{order}: {event}");

        let entries = self.frames.last().map(|frame| frame.entries.clone()).unwrap_or_default();
        let found = self.candidates(&entries, Step::selects_text);
        if let Some(mut frame) = self.frames.pop() {
            let scope = frame.scope;
            let outcome = found.into_iter().try_for_each(|(entry, node)| {
                let context = Context::new(scope, entry);
                if self.evaluator.hit(context, &event, node)? {
                    self.accept(&mut frame, context, &event, node)?;
                }
                Ok::<(), Abort>(())
            });
            self.frames.push(frame);
            outcome?;
        }

        let mut fed = HashSet::new();
        let collectors: Vec<(u64, NodeId)> = self
            .frames
            .iter()
            .flat_map(|frame| frame.collectors.iter().map(|&node| (frame.scope, node)))
            .filter(|&(_, node)| fed.insert(node))
            .collect();
        for (scope, node) in collectors {
            self.evaluator.hit(Context::new(scope, node), &event, node)?;
        }

        for pending in self.frames.iter_mut().flat_map(|frame| frame.compares.iter_mut()) {
            pending.value.push_str(text);
        }
        Ok(())
    }

    fn close(&mut self, qname: &str, offset: usize) -> Result<(), Abort> {
        if self.frames.len() < 2 {
            return Err(SniffError::Mismatched { expected: None, found: qname.to_string(), offset }
                .into());
        }
        let Some(frame) = self.frames.pop() else { return Ok(()) };
        if frame.qname != qname {
            return Err(SniffError::Mismatched {
                expected: Some(frame.qname),
                found: qname.to_string(),
                offset,
            }
            .into());
        }
        self.namespaces.pop();

        let order = self.evaluator.advance();
        if let Some(name) = frame.name.as_ref() {
            for pending in &frame.compares {
                let NodeKind::Compare(comparison) = self.forest.node(pending.node).kind() else {
                    continue;
                };
                if comparison.test(&pending.value) {
                    let event = Event::End { name, value: &pending.value };
                    trace!("{order}: {event}");
                    self.evaluator.hit(pending.context, &event, pending.node)?;
                }
            }
        }
        self.evaluator.close_scope(frame.scope, &frame.matched);
        Ok(())
    }
}

/// Evaluate every query of `set` over `input` in one pass.
///
/// # Errors
///
/// Returns a [`SniffError`] on malformed markup or a malformed forest.
pub fn sniff(set: &QuerySet, input: &str, options: &SniffOptions) -> Result<Results, SniffError> {
    let mut sniffer = Sniffer::new(set.forest(), set.root(), options);
    let outcome = sniffer.run(input)?;
    let values = set
        .queries()
        .iter()
        .map(|xpath| sniffer.results(xpath))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Results { values, outcome })
}
