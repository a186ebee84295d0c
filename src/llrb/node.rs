//! Nodes of the left-leaning red-black tree.
//!
//! Each node exclusively owns its children, so a rotation is a transfer of
//! owned subtrees between two nodes - there is no aliasing to get wrong. The
//! colour invariants maintained by the insert path are:
//!
//! * red links lean left: no node has a red right child,
//! * no red node has a red left child (no double-red),
//! * every root-to-leaf path crosses the same number of black nodes.

/// The colour of the link from a node's parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Color {
    Red,
    Black,
}

pub(crate) struct Node<E> {
    pub(crate) entry: E,
    pub(crate) left: Option<Box<Node<E>>>,
    pub(crate) right: Option<Box<Node<E>>>,
    pub(crate) color: Color,
}

/// Absent children count as black.
pub(crate) fn is_red<E>(node: Option<&Node<E>>) -> bool {
    matches!(node, Some(n) if n.color == Color::Red)
}

impl<E> Node<E> {
    /// A freshly inserted node is always red.
    pub(crate) fn new(entry: E) -> Box<Self> {
        Box::new(Node {
            entry,
            left: None,
            right: None,
            color: Color::Red,
        })
    }

    /// Invert the colours of this node and both children. Used to push a
    /// temporary 4-node up the tree during insert; callers guarantee both
    /// children are present.
    pub(crate) fn color_flip(&mut self) {
        debug_assert!(self.left.is_some() && self.right.is_some());
        self.color = self.color.flip();
        if let Some(l) = self.left.as_deref_mut() {
            l.color = l.color.flip();
        }
        if let Some(r) = self.right.as_deref_mut() {
            r.color = r.color.flip();
        }
    }

    /// Anti-clockwise rotation. The caller guarantees the right child exists
    /// (it only rotates a red right link).
    pub(crate) fn rotate_left(mut self: Box<Self>) -> Box<Self> {
        let mut x = match self.right.take() {
            Some(x) => x,
            None => unreachable!("rotate_left requires a right child"),
        };
        self.right = x.left.take();
        x.color = self.color;
        self.color = Color::Red;
        x.left = Some(self);
        x
    }

    /// Clockwise rotation. The caller guarantees the left child exists.
    pub(crate) fn rotate_right(mut self: Box<Self>) -> Box<Self> {
        let mut x = match self.left.take() {
            Some(x) => x,
            None => unreachable!("rotate_right requires a left child"),
        };
        self.left = x.right.take();
        x.color = self.color;
        self.color = Color::Red;
        x.right = Some(self);
        x
    }
}

impl Color {
    fn flip(self) -> Self {
        match self {
            Color::Red => Color::Black,
            Color::Black => Color::Red,
        }
    }
}
