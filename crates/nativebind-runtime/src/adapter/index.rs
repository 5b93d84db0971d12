//! Index-path composition over nested native containers.
//!
//! An index-style call takes its first N arguments as a subscript path.
//! The path walks into the container one level per subscript, then the
//! remaining operation runs on whatever it reached: an element for
//! `Get`/`Set`, a container for `Size`/`Empty`/`Resize`. Every subscript is
//! bounds-checked; nothing past the end of a container is ever touched.

use nativebind_core::{IndexOp, ResourceError};

use crate::{Address, NativeBool, Pointer, Reclaimer};

/// A value reachable through a subscript path.
///
/// Leaves (primitives, strings) have depth 0; `Vec<C>` adds one level.
pub trait Indexed {
    /// Number of subscripts needed to reach an element.
    const DEPTH: usize;

    /// The element type at the bottom of the nesting.
    type Elem: Clone;

    /// Length of the container at `path`.
    fn len_at(&self, path: &[usize]) -> Result<usize, ResourceError>;

    /// Resize the container at `path`, default-filling new slots.
    fn resize_at(&mut self, path: &[usize], len: usize) -> Result<(), ResourceError>;

    /// Read the element at `path`.
    fn get_at(&self, path: &[usize]) -> Result<Self::Elem, ResourceError>;

    /// Write the element at `path`.
    fn set_at(&mut self, path: &[usize], value: Self::Elem) -> Result<(), ResourceError>;
}

macro_rules! indexed_leaf {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Indexed for $ty {
                const DEPTH: usize = 0;
                type Elem = $ty;

                fn len_at(&self, path: &[usize]) -> Result<usize, ResourceError> {
                    Err(leaf_path(path))
                }

                fn resize_at(&mut self, path: &[usize], _len: usize) -> Result<(), ResourceError> {
                    Err(leaf_path(path))
                }

                fn get_at(&self, path: &[usize]) -> Result<$ty, ResourceError> {
                    if path.is_empty() { Ok(self.clone()) } else { Err(leaf_path(path)) }
                }

                fn set_at(&mut self, path: &[usize], value: $ty) -> Result<(), ResourceError> {
                    if !path.is_empty() {
                        return Err(leaf_path(path));
                    }
                    *self = value;
                    Ok(())
                }
            }
        )*
    };
}

fn leaf_path(path: &[usize]) -> ResourceError {
    ResourceError::InvalidIndexPath {
        given: path.len(),
        depth: 0,
    }
}

indexed_leaf!(bool, i8, i16, u16, i32, i64, f32, f64, usize, NativeBool, Address, String);

fn slot<C>(items: &[C], index: usize) -> Result<&C, ResourceError> {
    items.get(index).ok_or(ResourceError::IndexOutOfRange {
        index,
        size: items.len(),
    })
}

fn slot_mut<C>(items: &mut [C], index: usize) -> Result<&mut C, ResourceError> {
    let size = items.len();
    items
        .get_mut(index)
        .ok_or(ResourceError::IndexOutOfRange { index, size })
}

impl<C: Indexed + Clone + Default> Indexed for Vec<C> {
    const DEPTH: usize = C::DEPTH + 1;
    type Elem = C::Elem;

    fn len_at(&self, path: &[usize]) -> Result<usize, ResourceError> {
        match path.split_first() {
            None => Ok(self.len()),
            Some((&index, rest)) => slot(self, index)?.len_at(rest),
        }
    }

    fn resize_at(&mut self, path: &[usize], len: usize) -> Result<(), ResourceError> {
        match path.split_first() {
            None => {
                self.resize(len, C::default());
                Ok(())
            }
            Some((&index, rest)) => slot_mut(self, index)?.resize_at(rest, len),
        }
    }

    fn get_at(&self, path: &[usize]) -> Result<C::Elem, ResourceError> {
        match path.split_first() {
            None => Err(ResourceError::InvalidIndexPath {
                given: 0,
                depth: Self::DEPTH,
            }),
            Some((&index, rest)) => slot(self, index)?.get_at(rest),
        }
    }

    fn set_at(&mut self, path: &[usize], value: C::Elem) -> Result<(), ResourceError> {
        match path.split_first() {
            None => Err(ResourceError::InvalidIndexPath {
                given: 0,
                depth: Self::DEPTH,
            }),
            Some((&index, rest)) => slot_mut(self, index)?.set_at(rest, value),
        }
    }
}

/// Check that `path` fits `op` on a container of `depth` levels.
///
/// Element operations need a full path; container operations need a
/// strictly shorter one.
pub(crate) fn check_path(op: IndexOp, path: &[usize], depth: usize) -> Result<(), ResourceError> {
    let fits = if op.addresses_element() {
        path.len() == depth
    } else {
        path.len() < depth
    };
    if fits {
        Ok(())
    } else {
        Err(ResourceError::InvalidIndexPath {
            given: path.len(),
            depth,
        })
    }
}

/// The operation an index-style call performs after its subscripts.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexCall<E> {
    Get,
    Set(E),
    Size,
    Empty,
    Resize(usize),
}

/// What an index-style call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexResult<E> {
    Element(E),
    Size(usize),
    Empty(bool),
    Done,
}

impl<E: Clone> IndexCall<E> {
    /// The declaration-level operation.
    pub fn op(&self) -> IndexOp {
        match self {
            IndexCall::Get => IndexOp::Get,
            IndexCall::Set(_) => IndexOp::Set,
            IndexCall::Size => IndexOp::Size,
            IndexCall::Empty => IndexOp::Empty,
            IndexCall::Resize(_) => IndexOp::Resize,
        }
    }

    /// Apply the subscript `path` to `container`, then run the operation.
    pub fn apply<C>(self, container: &mut C, path: &[usize]) -> Result<IndexResult<E>, ResourceError>
    where
        C: Indexed<Elem = E>,
    {
        check_path(self.op(), path, C::DEPTH)?;
        match self {
            IndexCall::Get => container.get_at(path).map(IndexResult::Element),
            IndexCall::Set(value) => container.set_at(path, value).map(|()| IndexResult::Done),
            IndexCall::Size => container.len_at(path).map(IndexResult::Size),
            IndexCall::Empty => container.len_at(path).map(|n| IndexResult::Empty(n == 0)),
            IndexCall::Resize(len) => container.resize_at(path, len).map(|()| IndexResult::Done),
        }
    }
}

/// Index-style access on a handle to a native container object.
///
/// Operations act on the container at the handle's position.
impl<C: Indexed> Pointer<C> {
    /// Number of elements at the top level.
    pub fn size(&self) -> Result<usize, ResourceError> {
        self.size_at(&[])
    }

    /// Number of elements of the container at `path`.
    pub fn size_at(&self, path: &[usize]) -> Result<usize, ResourceError> {
        check_path(IndexOp::Size, path, C::DEPTH)?;
        self.element_ref()?.len_at(path)
    }

    /// Whether the container at `path` is empty.
    pub fn is_empty_at(&self, path: &[usize]) -> Result<bool, ResourceError> {
        check_path(IndexOp::Empty, path, C::DEPTH)?;
        Ok(self.element_ref()?.len_at(path)? == 0)
    }

    /// Resize the top-level container.
    pub fn resize(&mut self, len: usize) -> Result<&mut Self, ResourceError> {
        self.resize_at(&[], len)
    }

    /// Resize the container at `path`.
    pub fn resize_at(&mut self, path: &[usize], len: usize) -> Result<&mut Self, ResourceError> {
        check_path(IndexOp::Resize, path, C::DEPTH)?;
        self.element_mut()?.resize_at(path, len)?;
        Ok(self)
    }

    /// Read the element at `path`.
    pub fn get_at(&self, path: &[usize]) -> Result<C::Elem, ResourceError> {
        check_path(IndexOp::Get, path, C::DEPTH)?;
        self.element_ref()?.get_at(path)
    }

    /// Write the element at `path`.
    pub fn put_at(&mut self, path: &[usize], value: C::Elem) -> Result<&mut Self, ResourceError> {
        check_path(IndexOp::Set, path, C::DEPTH)?;
        self.element_mut()?.set_at(path, value)?;
        Ok(self)
    }

    /// Run an index-style call against the container.
    pub fn index(&mut self, call: IndexCall<C::Elem>, path: &[usize]) -> Result<IndexResult<C::Elem>, ResourceError> {
        call.apply(self.element_mut()?, path)
    }
}

impl<C: Indexed + Clone + Default + Send + 'static> Pointer<C> {
    /// Allocate one container object holding `len` default elements.
    pub fn sized(len: usize) -> Result<Self, ResourceError> {
        Self::sized_in(len, Reclaimer::global())
    }

    /// Allocate one container object holding `len` default elements, reclaimed by `reclaimer`.
    pub fn sized_in(len: usize, reclaimer: &Reclaimer) -> Result<Self, ResourceError> {
        let mut handle = Self::allocate_in(1, reclaimer);
        handle.resize(len)?;
        Ok(handle)
    }
}
