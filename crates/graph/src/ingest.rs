//! Per-file ingestion for language matchers.
//!
//! A matcher walks one source file, declares the functions it finds and the
//! calls they make. Sink classification comes from a [`SinkRegistry`] the
//! caller constructs once and lends to every file; nothing here is global.

use crate::graph::CallGraph;
use crate::types::{make_method_id, make_node_id, Edge, Node, NodeKind};
use std::collections::HashSet;

/// Decides whether a called function is a dangerous sink
pub trait SinkRegistry: Send + Sync {
    fn is_sink(&self, class_name: Option<&str>, function_name: &str) -> bool;
}

/// Set-backed registry of sink functions and methods
#[derive(Debug, Clone, Default)]
pub struct SinkTable {
    functions: HashSet<String>,
    methods: HashSet<(String, String)>,
}

impl SinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Free function sink, e.g. `exec`
    pub fn with_function(mut self, name: impl Into<String>) -> Self {
        self.functions.insert(name.into());
        self
    }

    /// Method sink, e.g. `Statement::executeQuery`
    pub fn with_method(mut self, class_name: impl Into<String>, name: impl Into<String>) -> Self {
        self.methods.insert((class_name.into(), name.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.functions.len() + self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SinkRegistry for SinkTable {
    fn is_sink(&self, class_name: Option<&str>, function_name: &str) -> bool {
        match class_name {
            Some(class) => self
                .methods
                .contains(&(class.to_string(), function_name.to_string())),
            None => self.functions.contains(function_name),
        }
    }
}

/// Callee named at a call site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTarget {
    pub function_name: String,
    pub class_name: Option<String>,

    /// File defining the callee; `None` means the calling file
    pub file_path: Option<String>,
}

impl CallTarget {
    pub fn function(name: impl Into<String>) -> Self {
        Self {
            function_name: name.into(),
            class_name: None,
            file_path: None,
        }
    }

    pub fn method(class_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            function_name: name.into(),
            class_name: Some(class_name.into()),
            file_path: None,
        }
    }

    pub fn defined_in(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }
}

/// Structural facts about a call site
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallSite {
    pub line: u32,
    pub column: u32,
    pub argument_count: u32,
    pub branch_depth: u32,
    pub in_loop: bool,
}

impl CallSite {
    pub fn at(line: u32, column: u32) -> Self {
        Self {
            line,
            column,
            ..Self::default()
        }
    }
}

/// Ingestion handle for one source file
///
/// Cheap to create; many may feed the same graph from different threads.
pub struct FileIngest<'a> {
    graph: &'a CallGraph,
    registry: &'a dyn SinkRegistry,
    file_path: String,
    language: String,
}

impl<'a> FileIngest<'a> {
    pub fn new(
        graph: &'a CallGraph,
        registry: &'a dyn SinkRegistry,
        file_path: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            graph,
            registry,
            file_path: file_path.into(),
            language: language.into(),
        }
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Declare a free function; returns its ID
    pub fn function(&self, name: &str, line: u32, kind: NodeKind) -> String {
        let node = Node::function(&self.file_path, name, kind)
            .at_line(line)
            .with_language(self.language.as_str());
        let id = node.id.clone();
        self.graph.add_node(node);
        id
    }

    /// Declare a method; returns its ID
    pub fn method(&self, class_name: &str, name: &str, line: u32, kind: NodeKind) -> String {
        let node = Node::method(&self.file_path, class_name, name, kind)
            .at_line(line)
            .with_language(self.language.as_str());
        let id = node.id.clone();
        self.graph.add_node(node);
        id
    }

    /// Record a call from `caller_id`; returns the callee ID
    ///
    /// Registry-confirmed sinks get a `Sink` node on first sight. Other callees
    /// are linked by ID only and resolve once their file declares them.
    pub fn call(&self, caller_id: &str, target: &CallTarget, site: CallSite) -> String {
        let callee_file = target.file_path.as_deref().unwrap_or(&self.file_path);
        let callee_id = match &target.class_name {
            Some(class) => make_method_id(callee_file, class, &target.function_name),
            None => make_node_id(callee_file, &target.function_name),
        };

        if self
            .registry
            .is_sink(target.class_name.as_deref(), &target.function_name)
        {
            let mut sink = Node::new(callee_id.as_str(), target.function_name.as_str(), NodeKind::Sink)
                .with_language(self.language.as_str());
            sink.file_path = callee_file.to_string();
            sink.class_name = target.class_name.clone();
            if self.graph.add_node_if_absent(sink) {
                log::trace!("registered sink {callee_id}");
            }
        }

        let edge = Edge::new(caller_id, callee_id.as_str())
            .at(self.file_path.as_str(), site.line, site.column)
            .with_arguments(site.argument_count)
            .conditional(site.branch_depth)
            .looped(site.in_loop);
        self.graph.add_edge(edge);

        callee_id
    }
}
