//! Host-side semantics of every operation.
//!
//! The env provider lifts wire arguments into [`Arg`]s and hands them to a
//! [`HostCallHandler`]; the handler answers with typed outputs or an error
//! code. It never sees guest memory.

use slotlink_abi::{Arg, ArgReader, ErrorCode, OpId, Output};
use tracing::{debug, trace};

use crate::world::World;

/// Something that can serve host calls.
pub trait HostCallHandler {
    /// Serve `op`. On success the outputs match the operation's declared
    /// outputs in count, order and type.
    fn handle(&mut self, op: OpId, args: &[Arg]) -> Result<Vec<Output>, ErrorCode>;
}

impl HostCallHandler for World {
    fn handle(&mut self, op: OpId, args: &[Arg]) -> Result<Vec<Output>, ErrorCode> {
        trace!(%op, ?args, "host call");
        let result = dispatch(self, op, &ArgReader::new(args));
        if let Err(code) = &result {
            debug!(%op, %code, "host call failed");
        }
        result
    }
}

fn dispatch(world: &mut World, op: OpId, a: &ArgReader<'_>) -> Result<Vec<Output>, ErrorCode> {
    use Output::*;

    let out = match op {
        OpId::SlotRootSlot => vec![RefId(world.root())],
        OpId::SlotGetParent => vec![RefId(world.parent(a.ref_id(0)?)?)],
        OpId::SlotGetActiveUser => vec![RefId(world.active_user(a.ref_id(0)?)?)],
        OpId::SlotGetActiveUserRoot => vec![RefId(world.active_user_root(a.ref_id(0)?)?)],
        OpId::SlotGetObjectRoot => vec![RefId(world.object_root(a.ref_id(0)?, a.bool(1)?)?)],
        OpId::SlotGetName => vec![Str(world.name(a.ref_id(0)?)?.to_string())],
        OpId::SlotSetName => {
            world.set_name(a.ref_id(0)?, a.str(1)?)?;
            vec![]
        }
        OpId::SlotGetNumChildren => {
            let count = world.children(a.ref_id(0)?)?.len();
            vec![Int(i32::try_from(count).map_err(|_| ErrorCode::HostFailure)?)]
        }
        OpId::SlotGetChild => vec![RefId(world.child(a.ref_id(0)?, a.int(1)?)?)],
        OpId::SlotGetChildren => vec![RefIds(world.children(a.ref_id(0)?)?.to_vec())],
        OpId::SlotFindChildByName => vec![RefId(world.find_child_by_name(
            a.ref_id(0)?,
            a.str(1)?,
            a.bool(2)?,
            a.bool(3)?,
            a.int(4)?,
        )?)],
        OpId::SlotFindChildByTag => {
            vec![RefId(world.find_child_by_tag(a.ref_id(0)?, a.str(1)?, a.int(2)?)?)]
        }
        OpId::SlotGetComponent => vec![RefId(world.find_component(a.ref_id(0)?, a.str(1)?)?)],
        OpId::SlotGetComponents => vec![RefIds(world.components(a.ref_id(0)?)?.to_vec())],
        OpId::ComponentGetTypeName => {
            vec![Str(world.component_type_name(a.ref_id(0)?)?.to_string())]
        }
        OpId::ComponentGetMember => {
            let (tag, member) = world.find_member(a.ref_id(0)?, a.str(1)?)?;
            vec![TypeTag(tag), RefId(member)]
        }
        OpId::ValueGetInt => vec![Int(world.get_int(a.ref_id(0)?)?)],
        OpId::ValueGetFloat => vec![Float(world.get_float(a.ref_id(0)?)?)],
        OpId::ValueGetDouble => vec![Double(world.get_double(a.ref_id(0)?)?)],
        OpId::ValueSetInt => {
            world.set_int(a.ref_id(0)?, a.int(1)?)?;
            vec![]
        }
        OpId::ValueSetFloat => {
            world.set_float(a.ref_id(0)?, a.float(1)?)?;
            vec![]
        }
        OpId::ValueSetDouble => {
            world.set_double(a.ref_id(0)?, a.double(1)?)?;
            vec![]
        }
    };
    Ok(out)
}
