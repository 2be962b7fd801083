//! Graphviz rendering of automata

use std::{
    borrow::Cow,
    collections::BTreeMap,
    fmt::{self, Display},
};

use indexmap::IndexMap;

use crate::{
    dfa::{Dfa, ERROR, Span},
    prog::{Inst, Program},
};

macro_rules! attr {
    ($id:ident, $name:literal) => {
        pub fn $id<S: Into<Cow<'a, str>>>(&mut self, $id: S) -> &mut Self {
            self.attrs.insert($name, $id.into());
            self
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GraphType {
    Undirected,
    Directed,
}

impl GraphType {
    fn edge_op(self) -> &'static str {
        match self {
            Self::Undirected => "--",
            Self::Directed => "->",
        }
    }
}

impl Display for GraphType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Undirected => "graph",
            Self::Directed => "digraph",
        })
    }
}

type Attrs<'a> = BTreeMap<&'static str, Cow<'a, str>>;

#[derive(Debug)]
pub struct Graph<'a> {
    ty: GraphType,
    id: Option<Cow<'a, str>>,
    attrs: Attrs<'a>,
    nodes: IndexMap<Cow<'a, str>, Node<'a>>,
    edges: Vec<(Cow<'a, str>, Cow<'a, str>, Edge<'a>)>,
}

impl<'a> Graph<'a> {
    attr!(label, "label");

    attr!(rank_dir, "rankdir");

    #[must_use]
    pub fn new(ty: GraphType) -> Self {
        Self {
            ty,
            id: None,
            attrs: BTreeMap::new(),
            nodes: IndexMap::new(),
            edges: vec![],
        }
    }

    #[must_use]
    pub fn new_with_id<S: Into<Cow<'a, str>>>(ty: GraphType, id: S) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::new(ty)
        }
    }

    /// Get or create the node with the given ID
    pub fn node<S: Into<Cow<'a, str>>>(&mut self, id: S) -> &mut Node<'a> {
        self.nodes.entry(id.into()).or_default()
    }

    /// Add an edge, creating either endpoint if needed
    pub fn edge<L: Into<Cow<'a, str>>, R: Into<Cow<'a, str>>>(&mut self, l: L, r: R) -> &mut Edge<'a> {
        let l = l.into();
        let r = r.into();
        self.node(l.clone());
        self.node(r.clone());

        self.edges.push((l, r, Edge::default()));
        &mut self.edges.last_mut().unwrap_or_else(|| unreachable!()).2
    }

    /// Add an invisible entry point with an edge into `start`
    fn entry<S: Into<Cow<'a, str>>>(&mut self, start: S) {
        self.node("_start").style("invis").shape("point").label("");
        self.edge("_start", start);
    }
}

#[derive(Default)]
struct AttrState {
    any: bool,
}

impl AttrState {
    fn write_all(f: &mut fmt::Formatter<'_>, attrs: &Attrs<'_>) -> fmt::Result {
        let mut me = Self::default();
        for (key, val) in attrs {
            f.write_str(if me.any {
                ","
            } else {
                me.any = true;
                "["
            })?;
            write!(f, "{key}={val:?}")?;
        }

        if me.any { f.write_str("]") } else { Ok(()) }
    }
}

impl Display for Graph<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            ty,
            id,
            attrs,
            nodes,
            edges,
        } = self;

        write!(f, "{ty}")?;
        if let Some(id) = id {
            write!(f, " {id:?}")?;
        }
        f.write_str(" {")?;

        for (key, val) in attrs {
            write!(f, "{key}={val:?};")?;
        }

        for (id, Node { attrs }) in nodes {
            write!(f, "{id:?}")?;
            AttrState::write_all(f, attrs)?;
            f.write_str(";")?;
        }

        for (l, r, Edge { attrs }) in edges {
            write!(f, "{l:?}{}{r:?}", ty.edge_op())?;
            AttrState::write_all(f, attrs)?;
            f.write_str(";")?;
        }

        f.write_str("}")
    }
}

#[derive(Debug, Default)]
pub struct Node<'a> {
    attrs: Attrs<'a>,
}

impl<'a> Node<'a> {
    attr!(style, "style");

    attr!(shape, "shape");

    attr!(label, "label");

    attr!(border_count, "peripheries");
}

#[derive(Debug, Default)]
pub struct Edge<'a> {
    attrs: Attrs<'a>,
}

impl<'a> Edge<'a> {
    attr!(style, "style");

    attr!(label, "label");
}

/// The states of a DFA, with accepting states circled twice and labeled
/// with their match ID
#[must_use]
pub fn dfa(dfa: &Dfa) -> Graph<'static> {
    let mut graph = Graph::new(GraphType::Directed);
    graph.rank_dir("LR");

    for state in (0..dfa.state_count()).filter(|&s| s != ERROR) {
        let node = graph.node(state.to_string());
        if let Some(id) = dfa.accepting(state) {
            node.label(format!("{state}:{id}")).border_count("2");
        } else {
            node.label(state.to_string());
        }

        let mut by_target = IndexMap::<usize, Vec<String>>::new();
        for (lo, hi, target) in dfa.edges(state) {
            by_target
                .entry(target)
                .or_default()
                .push(Span(lo, hi).to_string());
        }

        for (target, spans) in by_target {
            graph
                .edge(state.to_string(), target.to_string())
                .label(spans.join(", "));
        }
    }

    graph.entry(dfa.start().to_string());
    graph
}

/// The control flow of a bytecode program, with epsilon edges dashed
#[must_use]
pub fn program(prog: &Program) -> Graph<'static> {
    let mut graph = Graph::new(GraphType::Directed);
    graph.rank_dir("LR");

    for (pc, &inst) in prog.insts().iter().enumerate() {
        let id = pc.to_string();
        let node = graph.node(id.clone());

        match inst {
            Inst::Char(lo, hi) => {
                node.label(id.clone());
                graph.edge(id, (pc + 1).to_string()).label(Span(lo, hi).to_string());
            },
            Inst::CharJmp(lo, hi) => {
                node.label(id.clone());
                graph.edge(id.clone(), (pc + 1).to_string()).label(Span(lo, hi).to_string());
                graph.edge(id, (pc + 2).to_string()).style("dashed").label("else");
            },
            Inst::Split(x, y) => {
                node.label(id.clone());
                graph.edge(id.clone(), x.to_string()).style("dashed");
                graph.edge(id, y.to_string()).style("dashed");
            },
            Inst::Jmp(x) => {
                node.label(id.clone());
                graph.edge(id, x.to_string()).style("dashed");
            },
            Inst::Match(match_id) => {
                node.label(format!("{pc}:{match_id}")).border_count("2");
                if prog.is_deterministic() {
                    graph.edge(id, (pc + 1).to_string()).style("dashed");
                }
            },
            Inst::Fail => {
                node.label(format!("{pc}:fail")).shape("box");
            },
        }
    }

    graph.entry("0");
    graph
}

#[cfg(test)]
mod test {
    use super::{Graph, GraphType};
    use crate::{dfa::Dfa, prog::Program, re::parse};

    #[test]
    fn graph_syntax() {
        let mut graph = Graph::new_with_id(GraphType::Directed, "g");
        graph.label("a \"graph\"");
        graph.node("x").shape("box");
        graph.edge("x", "y").label("e");

        assert_eq!(
            graph.to_string(),
            r#"digraph "g" {label="a \"graph\"";"x"[shape="box"];"y";"x"->"y"[label="e"];}"#
        );
    }

    #[test]
    fn dfa_graph() {
        let dfa = Dfa::compile(parse(b"a[bc]").unwrap()).minimize();

        assert_eq!(
            dfa.dot().to_string(),
            concat!(
                r#"digraph {rankdir="LR";"1"[label="1"];"2"[label="2"];"3"[label="3:0",peripheries="2"];"#,
                r#""_start"[label="",shape="point",style="invis"];"#,
                r#""1"->"2"[label="'a'"];"2"->"3"[label="'b'-'c'"];"_start"->"1";}"#
            )
        );
    }

    #[test]
    fn program_graph() {
        let prog = Program::compile(parse(b"a?").unwrap()).unwrap();
        let dot = prog.dot().to_string();

        assert!(dot.contains(r#""0"->"1"[style="dashed"]"#));
        assert!(dot.contains(r#""0"->"2"[style="dashed"]"#));
        assert!(dot.contains(r#""1"->"2"[label="'a'"]"#));
        assert!(dot.contains(r#""2"[label="2:0",peripheries="2"]"#));
        assert!(!dot.contains(r#""2"->"#));

        // 0 MATCH 0, 1 CHJMP a a, 2 JMP 4, 3 FAIL, 4 MATCH 0, 5 FAIL
        let dot = prog.to_dfa().dot().to_string();
        assert!(dot.contains(r#""0"->"1"[style="dashed"]"#));
        assert!(dot.contains(r#""1"->"2"[label="'a'"]"#));
        assert!(dot.contains(r#""1"->"3"[label="else",style="dashed"]"#));
    }
}
