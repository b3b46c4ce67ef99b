//! Resumable, non-recursive depth-first traversal.
//!
//! The engine keeps its own stack of [`StackEntry`] frames on the heap, so the depth of a
//! tree only costs heap memory. A handler sees four events per node and steers the walk
//! through [`TraversalEventOutcome`]. Returning [`TraversalEventOutcome::Pause`] leaves the
//! stack untouched; the next [`Traversal::traverse`] call re-delivers the same event.

/// First-child / next-sibling view of a tree.
pub trait TreeNode {
    fn first_child(&self) -> Option<&Self>;
    fn next_sibling(&self) -> Option<&Self>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TraversalEvent {
    /// First visit, before any child.
    Enter,
    /// About to descend into the child at [`StackEntry::child_index`].
    BeforeChild,
    /// The child at [`StackEntry::child_index`] has been exited.
    AfterChild,
    /// All children are done; the node is about to be popped.
    Exit,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TraversalEventOutcome {
    /// Stop here; the same event fires again on resume.
    Pause,
    Continue,
    /// On `Enter`, skip the first `n` children. On `AfterChild`, skip `n` children after
    /// the current one.
    ContinueAndSkip(u16),
    /// Only valid on `AfterChild`: descend into the same child again.
    RepeatChild,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TraversalResult {
    Done,
    Paused,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    FirstSeen,
    BeforeChild,
    AfterChild,
    BeforeExit,
}

/// One frame of the traversal stack: a node, the handler's per-node data, and the
/// position among the node's children.
pub struct StackEntry<'t, N, F> {
    node: &'t N,
    child: Option<&'t N>,
    child_index: usize,
    state: State,
    pub frame: F,
}

impl<'t, N, F> StackEntry<'t, N, F> {
    #[inline]
    pub fn node(&self) -> &'t N {
        self.node
    }

    /// Index of the child the current `BeforeChild`/`AfterChild` event refers to.
    #[inline]
    pub fn child_index(&self) -> usize {
        self.child_index
    }
}

impl<'t, N: TreeNode, F> StackEntry<'t, N, F> {
    fn new(node: &'t N, frame: F) -> Self {
        Self {
            node,
            child: None,
            child_index: 0,
            state: State::FirstSeen,
            frame,
        }
    }

    fn skip_children(&mut self, count: usize) {
        for _ in 0..count {
            match self.child {
                Some(child) => {
                    self.child = child.next_sibling();
                    self.child_index += 1;
                }
                None => break,
            }
        }
    }
}

/// Receives traversal events and owns the per-node frames.
pub trait TraversalHandler<'t, N> {
    type Frame;

    fn create_frame(&mut self, node: &'t N) -> Self::Frame;

    fn handle(
        &mut self,
        event: TraversalEvent,
        entry: &mut StackEntry<'t, N, Self::Frame>,
    ) -> TraversalEventOutcome;
}

/// Walk state over one tree. Reusable across runs via [`Traversal::reset`]; the stack
/// allocation is kept. [`Traversal::into_storage`] carries the allocation over to a walk
/// of another tree.
pub struct Traversal<'t, N, F> {
    root: &'t N,
    stack: Vec<StackEntry<'t, N, F>>,
    started: bool,
}

impl<'t, N: TreeNode, F> Traversal<'t, N, F> {
    pub fn new(root: &'t N) -> Self {
        Self {
            root,
            stack: Vec::new(),
            started: false,
        }
    }

    /// Drops all frames; the next [`Traversal::traverse`] starts again at the root.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.started = false;
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn traverse<H>(&mut self, handler: &mut H) -> TraversalResult
    where
        H: TraversalHandler<'t, N, Frame = F>,
    {
        if !self.started {
            self.started = true;
            let frame = handler.create_frame(self.root);
            self.stack.push(StackEntry::new(self.root, frame));
        }

        loop {
            let Some(top) = self.stack.last_mut() else {
                return TraversalResult::Done;
            };
            match top.state {
                State::FirstSeen => {
                    let outcome = handler.handle(TraversalEvent::Enter, top);
                    top.child = top.node.first_child();
                    top.child_index = 0;
                    match outcome {
                        TraversalEventOutcome::Pause => {
                            top.child = None;
                            return TraversalResult::Paused;
                        }
                        TraversalEventOutcome::ContinueAndSkip(n) => top.skip_children(n as usize),
                        TraversalEventOutcome::Continue => {}
                        TraversalEventOutcome::RepeatChild => {
                            debug_assert!(false, "RepeatChild on Enter");
                        }
                    }
                    top.state = State::BeforeChild;
                }
                State::BeforeChild => {
                    let Some(child) = top.child else {
                        top.state = State::BeforeExit;
                        continue;
                    };
                    if handler.handle(TraversalEvent::BeforeChild, top)
                        == TraversalEventOutcome::Pause
                    {
                        return TraversalResult::Paused;
                    }
                    top.state = State::AfterChild;
                    let frame = handler.create_frame(child);
                    self.stack.push(StackEntry::new(child, frame));
                }
                State::AfterChild => match handler.handle(TraversalEvent::AfterChild, top) {
                    TraversalEventOutcome::Pause => return TraversalResult::Paused,
                    TraversalEventOutcome::RepeatChild => {
                        if let Some(child) = top.child {
                            let frame = handler.create_frame(child);
                            self.stack.push(StackEntry::new(child, frame));
                        }
                    }
                    TraversalEventOutcome::Continue => {
                        top.skip_children(1);
                        top.state = State::BeforeChild;
                    }
                    TraversalEventOutcome::ContinueAndSkip(n) => {
                        top.skip_children(n as usize + 1);
                        top.state = State::BeforeChild;
                    }
                },
                State::BeforeExit => {
                    if handler.handle(TraversalEvent::Exit, top) == TraversalEventOutcome::Pause {
                        return TraversalResult::Paused;
                    }
                    self.stack.pop();
                }
            }
        }
    }
}

/// The emptied stack of a finished [`Traversal`], not tied to any tree.
pub struct TraversalStorage<N: 'static, F> {
    stack: Vec<StackEntry<'static, N, F>>,
}

impl<N: 'static, F> TraversalStorage<N, F> {
    pub fn capacity(&self) -> usize {
        self.stack.capacity()
    }
}

impl<N: 'static, F> Default for TraversalStorage<N, F> {
    fn default() -> Self {
        Self { stack: Vec::new() }
    }
}

impl<N: 'static, F> std::fmt::Debug for TraversalStorage<N, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraversalStorage")
            .field("capacity", &self.stack.capacity())
            .finish()
    }
}

impl<'t, N: TreeNode + 'static, F> Traversal<'t, N, F> {
    /// A traversal of `root` that starts out with the allocation in `storage`.
    pub fn with_storage(root: &'t N, storage: TraversalStorage<N, F>) -> Self {
        Self {
            root,
            stack: storage.stack,
            started: false,
        }
    }

    /// Drops all frames and hands back the stack allocation.
    pub fn into_storage(self) -> TraversalStorage<N, F> {
        let mut stack = self.stack;
        stack.clear();
        // An empty vector collects in place into the same allocation.
        TraversalStorage {
            stack: stack.into_iter().filter_map(|_| None).collect(),
        }
    }
}
