use serde::{Deserialize, Serialize};

/// Build the conventional ID of a free function: `file:func`
pub fn make_node_id(file_path: &str, func_name: &str) -> String {
    format!("{file_path}:{func_name}")
}

/// Build the conventional ID of a method: `file:Class::method`
pub fn make_method_id(file_path: &str, class_name: &str, method_name: &str) -> String {
    format!("{file_path}:{class_name}::{method_name}")
}

/// Role of a callable in taint analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NodeKind {
    /// Plain function with no taint role
    #[default]
    Regular,

    /// HTTP handler, `main`, CLI command
    EntryPoint,

    /// Returns externally controlled data
    Source,

    /// Security-sensitive when fed tainted input
    Sink,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::EntryPoint => "entry_point",
            Self::Source => "source",
            Self::Sink => "sink",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Function or method in the call graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Unique key (e.g., "src/app.php:handle", "src/db.py:Repo::query")
    pub id: String,

    /// Short name as written in source
    pub name: String,

    pub file_path: String,
    pub line: u32,
    pub language: String,

    /// Enclosing class for methods
    pub class_name: Option<String>,

    pub is_public: bool,
    pub signature: String,

    pub kind: NodeKind,

    /// Hops from the nearest entry point, `None` when unreached
    pub distance_from_entry: Option<u32>,

    /// Hops to the nearest sink, `None` when no sink is reachable
    pub distance_to_sink: Option<u32>,
}

impl Node {
    /// Create a node with an explicit ID
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            file_path: String::new(),
            line: 0,
            language: String::new(),
            class_name: None,
            is_public: false,
            signature: String::new(),
            kind,
            distance_from_entry: None,
            distance_to_sink: None,
        }
    }

    /// Free function with the conventional `file:func` ID
    pub fn function(file_path: &str, name: &str, kind: NodeKind) -> Self {
        let mut node = Self::new(make_node_id(file_path, name), name, kind);
        node.file_path = file_path.to_string();
        node
    }

    /// Method with the conventional `file:Class::method` ID
    pub fn method(file_path: &str, class_name: &str, name: &str, kind: NodeKind) -> Self {
        let mut node = Self::new(make_method_id(file_path, class_name, name), name, kind);
        node.file_path = file_path.to_string();
        node.class_name = Some(class_name.to_string());
        node
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    pub fn public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }

    pub fn is_entry_point(&self) -> bool {
        self.kind == NodeKind::EntryPoint
    }

    pub fn is_sink(&self) -> bool {
        self.kind == NodeKind::Sink
    }

    /// Distances a freshly inserted node starts with
    pub(crate) fn reset_distances(&mut self) {
        self.distance_from_entry = match self.kind {
            NodeKind::EntryPoint => Some(0),
            NodeKind::Regular | NodeKind::Source | NodeKind::Sink => None,
        };
        self.distance_to_sink = match self.kind {
            NodeKind::Sink => Some(0),
            NodeKind::Regular | NodeKind::Source | NodeKind::EntryPoint => None,
        };
    }
}

/// Call site linking a caller to a callee
///
/// Not deduplicated: two calls between the same pair of functions are two edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub caller_id: String,

    /// May name a node that has not been added (yet)
    pub callee_id: String,

    pub file_path: String,
    pub line: u32,
    pub column: u32,

    pub argument_count: u32,
    pub is_conditional: bool,
    pub in_loop: bool,
    pub branch_depth: u32,
}

impl Edge {
    pub fn new(caller_id: impl Into<String>, callee_id: impl Into<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
            callee_id: callee_id.into(),
            file_path: String::new(),
            line: 0,
            column: 0,
            argument_count: 0,
            is_conditional: false,
            in_loop: false,
            branch_depth: 0,
        }
    }

    /// Attach the call-site location
    pub fn at(mut self, file_path: impl Into<String>, line: u32, column: u32) -> Self {
        self.file_path = file_path.into();
        self.line = line;
        self.column = column;
        self
    }

    pub fn with_arguments(mut self, argument_count: u32) -> Self {
        self.argument_count = argument_count;
        self
    }

    pub fn conditional(mut self, branch_depth: u32) -> Self {
        self.is_conditional = branch_depth > 0;
        self.branch_depth = branch_depth;
        self
    }

    pub fn looped(mut self, in_loop: bool) -> Self {
        self.in_loop = in_loop;
        self
    }
}
