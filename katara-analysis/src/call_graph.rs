//! The function call graph, its strongly-connected components, and
//! dead-function elimination.
//!
//! Direct calls contribute a single callee edge. Indirect calls are
//! over-approximated with the escaping-funcs set: every func number
//! that appears as a func constant anywhere in the program. Components
//! are computed with Tarjan's algorithm and cached until the graph is
//! mutated.

use std::collections::{BTreeMap, BTreeSet};

use katara_ir::{BlockNum, FuncNum, Instr, Program, StructuralError, Type, Value};
use tracing::debug;

/// One call instruction and its possible callees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncCall {
    caller: FuncNum,
    block: BlockNum,
    instr_index: usize,
    callees: BTreeSet<FuncNum>,
}

impl FuncCall {
    /// Describes the call at `block`/`instr_index` of `caller`.
    pub fn new(
        caller: FuncNum,
        block: BlockNum,
        instr_index: usize,
        callees: BTreeSet<FuncNum>,
    ) -> FuncCall {
        FuncCall {
            caller,
            block,
            instr_index,
            callees,
        }
    }

    /// The calling func.
    pub fn caller(&self) -> FuncNum {
        self.caller
    }

    /// The block holding the call instruction.
    pub fn block(&self) -> BlockNum {
        self.block
    }

    /// The call instruction's index inside its block.
    pub fn instr_index(&self) -> usize {
        self.instr_index
    }

    /// The possible callees.
    pub fn callees(&self) -> &BTreeSet<FuncNum> {
        &self.callees
    }
}

/// A strongly-connected set of funcs, with edges to the components it
/// calls and is called by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    members: BTreeSet<FuncNum>,
    callers: BTreeSet<usize>,
    callees: BTreeSet<usize>,
}

impl Component {
    /// The funcs in this component.
    pub fn members(&self) -> &BTreeSet<FuncNum> {
        &self.members
    }

    /// Indices of components calling into this one.
    pub fn callers(&self) -> &BTreeSet<usize> {
        &self.callers
    }

    /// Indices of components this one calls.
    pub fn callees(&self) -> &BTreeSet<usize> {
        &self.callees
    }
}

#[derive(Debug, Clone, Default)]
struct Components {
    list: Vec<Component>,
    by_func: BTreeMap<FuncNum, usize>,
}

/// A directed multigraph of funcs and calls.
#[derive(Debug, Clone, Default)]
pub struct FuncCallGraph {
    funcs: BTreeSet<FuncNum>,
    calls: Vec<FuncCall>,
    components: Option<Components>,
}

impl FuncCallGraph {
    /// Creates an empty graph.
    pub fn new() -> FuncCallGraph {
        FuncCallGraph::default()
    }

    /// The funcs in the graph.
    pub fn funcs(&self) -> &BTreeSet<FuncNum> {
        &self.funcs
    }

    /// The recorded calls.
    pub fn calls(&self) -> &[FuncCall] {
        &self.calls
    }

    /// Adds a func node. Invalidates cached components.
    pub fn add_func(&mut self, func: FuncNum) {
        self.funcs.insert(func);
        self.components = None;
    }

    /// Adds a call, inserting caller and callees as nodes. Invalidates
    /// cached components.
    pub fn add_call(&mut self, call: FuncCall) {
        self.funcs.insert(call.caller());
        self.funcs.extend(call.callees().iter().copied());
        self.calls.push(call);
        self.components = None;
    }

    /// The funcs callable from `caller`.
    pub fn callees_of(&self, caller: FuncNum) -> BTreeSet<FuncNum> {
        self.calls
            .iter()
            .filter(|call| call.caller() == caller)
            .flat_map(|call| call.callees().iter().copied())
            .collect()
    }

    /// The funcs that may call `callee`.
    pub fn callers_of(&self, callee: FuncNum) -> BTreeSet<FuncNum> {
        self.calls
            .iter()
            .filter(|call| call.callees().contains(&callee))
            .map(FuncCall::caller)
            .collect()
    }

    /// The calls issued by `caller`.
    pub fn calls_with_caller(&self, caller: FuncNum) -> Vec<&FuncCall> {
        self.calls
            .iter()
            .filter(|call| call.caller() == caller)
            .collect()
    }

    /// The calls that may reach `callee`.
    pub fn calls_with_callee(&self, callee: FuncNum) -> Vec<&FuncCall> {
        self.calls
            .iter()
            .filter(|call| call.callees().contains(&callee))
            .collect()
    }

    /// The component containing `func`, as an index usable with
    /// [`component`].
    ///
    /// [`component`]: FuncCallGraph::component
    pub fn component_of(&mut self, func: FuncNum) -> Option<usize> {
        self.ensure_components();
        self.components
            .as_ref()
            .expect("components generated")
            .by_func
            .get(&func)
            .copied()
    }

    /// The component with the given index.
    pub fn component(&mut self, index: usize) -> Option<&Component> {
        self.ensure_components();
        self.components
            .as_ref()
            .expect("components generated")
            .list
            .get(index)
    }

    /// The number of strongly-connected components.
    pub fn component_count(&mut self) -> usize {
        self.ensure_components();
        self.components
            .as_ref()
            .expect("components generated")
            .list
            .len()
    }

    /// Every func reachable in the component DAG from the component of
    /// `root`, including the component itself.
    pub fn funcs_reachable_from(&mut self, root: FuncNum) -> BTreeSet<FuncNum> {
        self.ensure_components();
        let components = self.components.as_ref().expect("components generated");
        let Some(&root_index) = components.by_func.get(&root) else {
            return BTreeSet::new();
        };
        let mut reachable = BTreeSet::from([root_index]);
        let mut frontier = vec![root_index];
        while let Some(current) = frontier.pop() {
            for &next in &components.list[current].callees {
                if reachable.insert(next) {
                    frontier.push(next);
                }
            }
        }
        reachable
            .into_iter()
            .flat_map(|index| components.list[index].members.iter().copied())
            .collect()
    }

    fn ensure_components(&mut self) {
        if self.components.is_none() {
            self.components = Some(self.generate_components());
        }
    }

    // Tarjan's strongly-connected components.
    fn generate_components(&self) -> Components {
        struct State {
            index: i64,
            stack: Vec<FuncNum>,
            on_stack: BTreeSet<FuncNum>,
            indices: BTreeMap<FuncNum, i64>,
            low_links: BTreeMap<FuncNum, i64>,
            components: Vec<BTreeSet<FuncNum>>,
        }

        fn strong_connect(graph: &FuncCallGraph, state: &mut State, func: FuncNum) {
            state.indices.insert(func, state.index);
            state.low_links.insert(func, state.index);
            state.index += 1;
            state.stack.push(func);
            state.on_stack.insert(func);

            for callee in graph.callees_of(func) {
                if !state.indices.contains_key(&callee) {
                    strong_connect(graph, state, callee);
                    let callee_low = state.low_links[&callee];
                    let func_low = state.low_links[&func];
                    state.low_links.insert(func, func_low.min(callee_low));
                } else if state.on_stack.contains(&callee) {
                    let callee_index = state.indices[&callee];
                    let func_low = state.low_links[&func];
                    state.low_links.insert(func, func_low.min(callee_index));
                }
            }

            if state.low_links[&func] == state.indices[&func] {
                let mut members = BTreeSet::new();
                loop {
                    let member = state.stack.pop().expect("component root on stack");
                    state.on_stack.remove(&member);
                    members.insert(member);
                    if member == func {
                        break;
                    }
                }
                state.components.push(members);
            }
        }

        let mut state = State {
            index: 0,
            stack: Vec::new(),
            on_stack: BTreeSet::new(),
            indices: BTreeMap::new(),
            low_links: BTreeMap::new(),
            components: Vec::new(),
        };
        for &func in &self.funcs {
            if !state.indices.contains_key(&func) {
                strong_connect(self, &mut state, func);
            }
        }

        let mut components = Components::default();
        for members in state.components {
            let index = components.list.len();
            for &member in &members {
                components.by_func.insert(member, index);
            }
            components.list.push(Component {
                members,
                callers: BTreeSet::new(),
                callees: BTreeSet::new(),
            });
        }
        for call in &self.calls {
            let caller_component = components.by_func[&call.caller()];
            for callee in call.callees() {
                let callee_component = components.by_func[callee];
                if caller_component == callee_component {
                    continue;
                }
                components.list[caller_component]
                    .callees
                    .insert(callee_component);
                components.list[callee_component]
                    .callers
                    .insert(caller_component);
            }
        }
        components
    }
}

/// Builds the call graph of a program, resolving indirect calls with
/// the escaping-funcs over-approximation.
pub fn build_func_call_graph(program: &Program) -> FuncCallGraph {
    let mut graph = FuncCallGraph::new();
    for func in program.funcs() {
        graph.add_func(func.num());
    }

    let escaping = escaping_funcs(program);
    for func in program.funcs() {
        for block in func.blocks() {
            for (index, instr) in block.instrs().iter().enumerate() {
                let Instr::Call(call) = instr else {
                    continue;
                };
                let callees = match call.callee() {
                    Value::Constant(constant) => {
                        BTreeSet::from([constant.func_num().expect("func-typed callee")])
                    }
                    _ => escaping.clone(),
                };
                graph.add_call(FuncCall::new(func.num(), block.num(), index, callees));
            }
        }
    }
    graph
}

// Func numbers appearing as func constants outside direct-call
// position: values an indirect call could reach.
fn escaping_funcs(program: &Program) -> BTreeSet<FuncNum> {
    let mut escaping = BTreeSet::new();
    let mut collect = |values: &[Value]| {
        for value in values {
            if let Value::Constant(constant) = value {
                if constant.typ() == Type::Func {
                    escaping.extend(constant.func_num());
                }
            }
        }
    };
    for func in program.funcs() {
        for block in func.blocks() {
            for instr in block.instrs() {
                if let Instr::Call(call) = instr {
                    collect(call.args());
                } else {
                    collect(&instr.used_values());
                }
            }
        }
    }
    escaping
}

/// Removes every func unreachable from the entry func's component.
pub fn remove_unused_funcs(program: &mut Program) -> Result<(), StructuralError> {
    let entry = program.entry().ok_or(StructuralError::NoEntryFunc)?;
    let mut graph = build_func_call_graph(program);
    let keep = graph.funcs_reachable_from(entry);
    let all: Vec<FuncNum> = program.func_nums().collect();
    for func in all {
        if !keep.contains(&func) {
            debug!(func, "removing unreachable func");
            program.remove_func(func)?;
        }
    }
    Ok(())
}
