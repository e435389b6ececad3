//! Stable identifiers of the heuristics, one per logical check.
//!
//! Downstream tooling can rely on these to filter or suppress messages.

// Device and objects
pub const CREATE_DEVICE_API_VERSION_MISMATCH: &str = "BestPractices-vkCreateDevice-API-version-mismatch";
pub const ALLOCATE_MEMORY_TOO_MANY_OBJECTS: &str = "BestPractices-vkAllocateMemory-too-many-objects";
pub const ALLOCATE_MEMORY_SMALL_ALLOCATION: &str = "BestPractices-vkAllocateMemory-small-allocation";
pub const ALLOCATE_MEMORY_REUSE_ALLOCATIONS: &str = "BestPractices-AllocateMemory-ReuseAllocations";
pub const SYNC_OBJECTS_HIGH_NUMBER_OF_SEMAPHORES: &str = "BestPractices-SyncObjects-HighNumberOfSemaphores";
pub const SYNC_OBJECTS_HIGH_NUMBER_OF_FENCES: &str = "BestPractices-SyncObjects-HighNumberOfFences";
pub const CREATE_PIPELINES_TOO_MANY_PIPELINES: &str = "BestPractices-CreatePipelines-TooManyPipelines";
pub const CREATE_PIPELINES_MULTIPLE_PIPELINE_CACHES: &str = "BestPractices-vkCreatePipelines-multiple-pipelines-caches";
pub const CREATE_PIPELINES_AVOID_PRIMITIVE_RESTART: &str = "BestPractices-CreatePipelines-AvoidPrimitiveRestart";

// Command buffers
pub const BEGIN_COMMAND_BUFFER_SIMULTANEOUS_USE: &str = "BestPractices-vkBeginCommandBuffer-simultaneous-use";
pub const BEGIN_COMMAND_BUFFER_ONE_TIME_SUBMIT: &str = "BestPractices-vkBeginCommandBuffer-one-time-submit";
pub const CMD_DRAW_INSTANCE_COUNT_ZERO: &str = "BestPractices-vkCmdDraw-instance-count-zero";
pub const CMD_DRAW_INDEXED_MANY_SMALL_INDEXED_DRAWCALLS: &str = "BestPractices-vkCmdDrawIndexed-many-small-indexed-drawcalls";
pub const CMD_DRAW_INDEXED_SPARSE_INDEX_BUFFER: &str = "BestPractices-vkCmdDrawIndexed-sparse-index-buffer";
pub const CMD_DRAW_INDEXED_POST_TRANSFORM_CACHE_THRASHING: &str = "BestPractices-vkCmdDrawIndexed-post-transform-cache-thrashing";
pub const PUSH_CONSTANTS_NOT_SET: &str = "BestPractices-PushConstants";
pub const CMD_BUFFER_HIGH_BARRIER_COUNT: &str = "BestPractices-CmdBuffer-highBarrierCount";
pub const EVENT_SIGNAL_SIGNALED_EVENT: &str = "BestPractices-Event-SignalSignaledEvent";

// Clears
pub const CLEAR_CMD_BEFORE_DRAW: &str = "BestPractices-DrawState-ClearCmdBeforeDraw";
pub const CLEAR_ATTACHMENT_CLEAR_AFTER_LOAD: &str = "BestPractices-vkCmdClearAttachments-clear-after-load";
pub const CLEAR_IMAGE_PREFER_LOAD_OP_CLEAR: &str = "BestPractices-ClearAttachment-ClearImage";
pub const CLEAR_COLOR_NOT_COMPRESSED: &str = "BestPractices-ClearColor-NotCompressed";
pub const CLEAR_COLOR_UNREGISTERED: &str = "BestPractices-ClearColor-UnregisteredColor";

// Transfers
pub const CMD_RESOLVE_IMAGE_RESOLVING_IMAGE: &str = "BestPractices-vkCmdResolveImage-resolving-image";

// Render passes
pub const END_RENDER_PASS_DEPTH_PRE_PASS_USAGE: &str = "BestPractices-vkCmdEndRenderPass-depth-pre-pass-usage";
pub const END_RENDER_PASS_REDUNDANT_ATTACHMENT_ON_TILE: &str = "BestPractices-vkCmdEndRenderPass-redundant-attachment-on-tile";
pub const RENDER_PASS_REDUNDANT_STORE: &str = "BestPractices-RenderPass-redundant-store";
pub const RENDER_PASS_REDUNDANT_CLEAR: &str = "BestPractices-RenderPass-redundant-clear";
pub const RENDER_PASS_INEFFICIENT_CLEAR: &str = "BestPractices-RenderPass-inefficient-clear";
pub const STORE_OP_DONT_CARE_THEN_LOAD_OP_LOAD: &str = "BestPractices-StoreOpDontCareThenLoadOpLoad";
pub const CONCURRENT_USAGE_OF_EXCLUSIVE_IMAGE: &str = "BestPractices-ConcurrentUsageOfExclusiveImage";

// Z-cull
pub const ZCULL_LESS_GREATER_RATIO: &str = "BestPractices-Zcull-LessGreaterRatio";

// Queues
pub const SUBMISSION_REDUCE_NUMBER_OF_SUBMISSIONS: &str = "BestPractices-Submission-ReduceNumberOfSubmissions";
