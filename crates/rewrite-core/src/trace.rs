/*!
# Frame Tracing

Explicit call-frame tagging for visitor code.

Visitors mark the methods they run through with [`enter`], which pushes a
frame onto a thread-local stack and pops it when the returned guard drops.
[`crate::RecipeFailure`] snapshots that stack when it is built, and a guard
dropped during a panic records the stack once so the scheduler can still
recover it after unwinding.

```rust
use rewrite_core::{trace, RecipeFailure, Tree, VisitResult};

struct Boom;

impl Boom {
    fn visit_text(&self, _text: &Tree) -> VisitResult<Tree> {
        let _frame = trace::enter::<Self>("visit_text");
        Err(RecipeFailure::new("boom").into())
    }
}
```
*/

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;

/// One tagged call frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Frame {
    owner: &'static str,
    method: &'static str,
}

impl Frame {
    pub fn new(owner: &'static str, method: &'static str) -> Self {
        Self { owner, method }
    }

    /// Fully-qualified name of the type that entered this frame
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    pub fn method(&self) -> &'static str {
        self.method
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner, self.method)
    }
}

thread_local! {
    static STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
    static UNWOUND: RefCell<Option<Vec<Frame>>> = const { RefCell::new(None) };
}

/// Pops its frame when dropped. Not `Send`: frames are thread-confined.
#[must_use = "the frame is popped as soon as the guard is dropped"]
pub struct FrameGuard {
    _not_send: PhantomData<*const ()>,
}

impl fmt::Debug for FrameGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameGuard").finish_non_exhaustive()
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let frames = snapshot();
            let _ = UNWOUND.try_with(|unwound| {
                let mut unwound = unwound.borrow_mut();
                if unwound.is_none() {
                    *unwound = Some(frames);
                }
            });
        } else {
            forget_unwound();
        }
        let _ = STACK.try_with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Enter a frame owned by `T`
///
/// Entering or normally leaving a frame forgets the frames of any panic that
/// visitor code already caught itself. A caught panic followed directly by a
/// second one, with no frame entered or left in between, still reports the
/// first panic's frames.
pub fn enter<T: ?Sized>(method: &'static str) -> FrameGuard {
    forget_unwound();
    let frame = Frame::new(std::any::type_name::<T>(), method);
    STACK.with(|stack| stack.borrow_mut().push(frame));
    FrameGuard {
        _not_send: PhantomData,
    }
}

fn forget_unwound() {
    let _ = UNWOUND.try_with(|unwound| unwound.borrow_mut().take());
}

/// Active frames on this thread, innermost first
pub fn snapshot() -> Vec<Frame> {
    STACK
        .try_with(|stack| stack.borrow().iter().rev().copied().collect())
        .unwrap_or_default()
}

/// Clear any frames left behind by an earlier invocation on this thread.
pub(crate) fn reset() {
    STACK.with(|stack| stack.borrow_mut().clear());
    UNWOUND.with(|unwound| unwound.borrow_mut().take());
}

/// Frames recorded by the first guard dropped during a panic, if any
pub(crate) fn take_unwound() -> Option<Vec<Frame>> {
    UNWOUND.with(|unwound| unwound.borrow_mut().take())
}

/// Module path of a fully-qualified type name, ignoring generic arguments.
///
/// `my_crate::recipes::Boom<T>` becomes `my_crate::recipes`.
pub fn module_path_of(type_name: &'static str) -> &'static str {
    let base = type_name
        .find('<')
        .map_or(type_name, |generics| &type_name[..generics]);
    base.rsplit_once("::").map_or(base, |(module, _)| module)
}

/// Whether `owner` is declared inside `scope` (a module or type path)
pub fn in_scope(owner: &str, scope: &str) -> bool {
    match owner.strip_prefix(scope) {
        Some(rest) => rest.is_empty() || rest.starts_with("::") || rest.starts_with('<'),
        None => false,
    }
}

/// Keep only the frames declared inside `scope`, preserving order
pub fn filter_to_scope(frames: &[Frame], scope: &str) -> Vec<Frame> {
    frames
        .iter()
        .filter(|frame| in_scope(frame.owner, scope))
        .copied()
        .collect()
}

/// Newline-separated frame lines
pub fn render(frames: &[Frame]) -> String {
    frames
        .iter()
        .map(Frame::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
