use super::{Communicator, WorkerContext};
use crate::block::LocalBlock;
use crate::error::HeatResult;

/// Single worker owning every interior row; nothing to exchange or wait for.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn exchange_borders(&self, _ctx: &WorkerContext, _block: &mut LocalBlock) -> HeatResult<()> {
        Ok(())
    }

    fn barrier(&self) -> HeatResult<()> {
        Ok(())
    }

    fn reduce_and(&self, value: bool) -> HeatResult<bool> {
        Ok(value)
    }
}
