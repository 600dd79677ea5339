//! Bounded walks over nested models and instancing dependencies.
//!
//! Both walks use an explicit stack and fail on cycles or on nesting deeper
//! than the configured limit instead of recursing.

use std::collections::HashSet;
use std::fmt;

use strix_math::Mat4;
use thiserror::Error;

use crate::provider::{MasterShapeProvider, ObjectId};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NestingError {
    #[error("cycle through {}", Path(path))]
    Cycle { path: Vec<ObjectId> },

    #[error("nesting depth {depth} exceeds limit {limit}")]
    TooDeep { depth: usize, limit: usize },
}

struct Path<'a>(&'a [ObjectId]);

impl fmt::Display for Path<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{}", id)?;
        }
        Ok(())
    }
}

/// One object reached by [`walk_hierarchy`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Visit {
    pub id: ObjectId,
    /// Transform from the object's space into the root's space
    pub transform: Mat4,
    /// 0 for the root
    pub depth: usize,
}

/// Every object under `root` (root included, depth first) with its
/// transform relative to the root.
pub fn walk_hierarchy<P>(
    provider: &P,
    root: ObjectId,
    time: f64,
    max_depth: usize,
) -> Result<Vec<Visit>, NestingError>
where
    P: MasterShapeProvider + ?Sized,
{
    let mut visits = Vec::new();
    let mut path: Vec<ObjectId> = Vec::new();
    let mut stack = vec![Visit {
        id: root,
        transform: Mat4::IDENTITY,
        depth: 0,
    }];

    while let Some(visit) = stack.pop() {
        if visit.depth > max_depth {
            return Err(NestingError::TooDeep {
                depth: visit.depth,
                limit: max_depth,
            });
        }

        // Entries at depth d are children of path[d - 1]
        path.truncate(visit.depth);
        if path.contains(&visit.id) {
            path.push(visit.id);
            return Err(NestingError::Cycle { path });
        }
        path.push(visit.id);

        let children = provider.children(visit.id, time);
        for (child, local) in children.into_iter().rev() {
            stack.push(Visit {
                id: child,
                transform: visit.transform * local,
                depth: visit.depth + 1,
            });
        }
        visits.push(visit);
    }

    Ok(visits)
}

/// Order `objects` so that each comes after the objects it depends on.
///
/// Dependencies outside `objects` are ignored. Objects with no relation keep
/// their input order.
pub fn dependency_order(
    objects: &[ObjectId],
    deps: impl Fn(ObjectId) -> Vec<ObjectId>,
    max_depth: usize,
) -> Result<Vec<ObjectId>, NestingError> {
    let wanted: HashSet<ObjectId> = objects.iter().copied().collect();
    let pending = |id: ObjectId| -> Vec<ObjectId> {
        deps(id).into_iter().filter(|d| wanted.contains(d)).collect()
    };

    let mut done = HashSet::new();
    let mut order = Vec::with_capacity(objects.len());

    for &root in objects {
        if done.contains(&root) {
            continue;
        }

        let mut stack: Vec<(ObjectId, Vec<ObjectId>, usize)> = vec![(root, pending(root), 0)];
        loop {
            let next = match stack.last_mut() {
                None => break,
                Some((_, queue, cursor)) => {
                    let next = queue.get(*cursor).copied();
                    *cursor += 1;
                    next
                }
            };

            match next {
                Some(dep) if done.contains(&dep) => {}
                Some(dep) => {
                    if stack.iter().any(|(id, _, _)| *id == dep) {
                        let mut path: Vec<ObjectId> = stack.iter().map(|(id, _, _)| *id).collect();
                        path.push(dep);
                        return Err(NestingError::Cycle { path });
                    }
                    if stack.len() > max_depth {
                        return Err(NestingError::TooDeep {
                            depth: stack.len(),
                            limit: max_depth,
                        });
                    }
                    stack.push((dep, pending(dep), 0));
                }
                None => {
                    if let Some((id, _, _)) = stack.pop() {
                        done.insert(id);
                        order.push(id);
                    }
                }
            }
        }
    }

    Ok(order)
}
