use crate::{device::BestPractices, VendorChecks};
use ash::vk;

/// # Dynamic state commands
impl BestPractices {
    pub fn record_cmd_set_depth_compare_op(
        &self,
        command_buffer: vk::CommandBuffer,
        depth_compare_op: vk::CompareOp,
    ) {
        if !self.reporter.vendor_enabled(VendorChecks::NVIDIA) {
            return;
        }

        if let Some(state) = self.command_buffer(command_buffer) {
            state.lock().zcull.set_depth_compare_op(depth_compare_op);
        }
    }

    pub fn record_cmd_set_depth_test_enable(
        &self,
        command_buffer: vk::CommandBuffer,
        depth_test_enable: bool,
    ) {
        if !self.reporter.vendor_enabled(VendorChecks::NVIDIA) {
            return;
        }

        if let Some(state) = self.command_buffer(command_buffer) {
            state.lock().zcull.set_depth_test_enable(depth_test_enable);
        }
    }
}
