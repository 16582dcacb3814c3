//! Descendant search.
//!
//! Direct children are depth 0. A search visits every descendant down to
//! and including `max_depth`; a negative `max_depth` has no limit. Order is
//! depth-first pre-order with siblings in child order, so the first match
//! is well defined.

use slotlink_abi::{ErrorCode, RefId};

use super::{Slot, World};

impl World {
    fn find_descendant(
        &self,
        slot: RefId,
        max_depth: i32,
        mut matches: impl FnMut(&Slot) -> bool,
    ) -> Result<RefId, ErrorCode> {
        let start = self.slot(slot)?;
        let mut stack: Vec<(RefId, i32)> = start.children.iter().rev().map(|c| (*c, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            let Some(data) = self.slots.get(&id) else {
                continue;
            };
            if matches(data) {
                return Ok(id);
            }
            if max_depth < 0 || depth < max_depth {
                stack.extend(data.children.iter().rev().map(|c| (*c, depth + 1)));
            }
        }
        Err(ErrorCode::NotFound)
    }

    pub fn find_child_by_name(
        &self,
        slot: RefId,
        name: &str,
        match_substring: bool,
        ignore_case: bool,
        max_depth: i32,
    ) -> Result<RefId, ErrorCode> {
        self.slot(slot)?;
        if name.is_empty() {
            return Err(ErrorCode::InvalidArgument);
        }
        let needle = if ignore_case { name.to_lowercase() } else { name.to_string() };
        self.find_descendant(slot, max_depth, |s| {
            let folded;
            let hay = if ignore_case {
                folded = s.name.to_lowercase();
                folded.as_str()
            } else {
                s.name.as_str()
            };
            if match_substring {
                hay.contains(needle.as_str())
            } else {
                hay == needle
            }
        })
    }

    pub fn find_child_by_tag(&self, slot: RefId, tag: &str, max_depth: i32) -> Result<RefId, ErrorCode> {
        self.slot(slot)?;
        if tag.is_empty() {
            return Err(ErrorCode::InvalidArgument);
        }
        self.find_descendant(slot, max_depth, |s| s.tag.as_deref() == Some(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Root
    /// ├─ Body
    /// │  └─ LeftHand (tag "hand")
    /// └─ Props
    ///    └─ Crate
    ///       └─ RightHand (tag "hand")
    fn tree() -> (World, [RefId; 5]) {
        let mut world = World::new("Root");
        let root = world.root();
        let body = world.add_slot(root, "Body").unwrap();
        let left = world.add_slot(body, "LeftHand").unwrap();
        let props = world.add_slot(root, "Props").unwrap();
        let crate_slot = world.add_slot(props, "Crate").unwrap();
        let right = world.add_slot(crate_slot, "RightHand").unwrap();
        world.set_tag(left, "hand").unwrap();
        world.set_tag(right, "hand").unwrap();
        (world, [body, left, props, crate_slot, right])
    }

    #[test]
    fn direct_children_are_depth_zero() {
        let (world, [body, left, ..]) = tree();
        let root = world.root();
        assert_eq!(world.find_child_by_name(root, "Body", false, false, 0), Ok(body));
        assert_eq!(
            world.find_child_by_name(root, "LeftHand", false, false, 0),
            Err(ErrorCode::NotFound)
        );
        assert_eq!(world.find_child_by_name(root, "LeftHand", false, false, 1), Ok(left));
    }

    #[test]
    fn negative_depth_is_unbounded() {
        let (world, [.., right]) = tree();
        assert_eq!(
            world.find_child_by_name(world.root(), "RightHand", false, false, -1),
            Ok(right)
        );
    }

    #[test]
    fn pre_order_picks_the_first_match() {
        let (world, [_, left, ..]) = tree();
        assert_eq!(
            world.find_child_by_name(world.root(), "hand", true, true, -1),
            Ok(left)
        );
        assert_eq!(world.find_child_by_tag(world.root(), "hand", -1), Ok(left));
    }

    #[test]
    fn tag_search_honours_depth() {
        let (world, [.., props, _, right]) = tree();
        assert_eq!(world.find_child_by_tag(props, "hand", 0), Err(ErrorCode::NotFound));
        assert_eq!(world.find_child_by_tag(props, "hand", 1), Ok(right));
    }

    #[test]
    fn case_and_substring_flags() {
        let (world, [body, ..]) = tree();
        let root = world.root();
        assert_eq!(world.find_child_by_name(root, "body", false, false, 0), Err(ErrorCode::NotFound));
        assert_eq!(world.find_child_by_name(root, "body", false, true, 0), Ok(body));
        assert_eq!(world.find_child_by_name(root, "od", true, false, 0), Ok(body));
    }

    #[test]
    fn empty_needles_are_rejected() {
        let (world, _) = tree();
        assert_eq!(
            world.find_child_by_name(world.root(), "", true, false, -1),
            Err(ErrorCode::InvalidArgument)
        );
        assert_eq!(world.find_child_by_tag(world.root(), "", -1), Err(ErrorCode::InvalidArgument));
        assert_eq!(
            world.find_child_by_tag(RefId(999), "hand", -1),
            Err(ErrorCode::InvalidHandle)
        );
    }
}
