use ash::vk;
use rangemap::RangeSet;

/// The bytes written by one `vkCmdPushConstants` call.
#[derive(Clone, Debug)]
pub(crate) struct PushConstantData {
    pub(crate) layout: vk::PipelineLayout,
    pub(crate) stage_flags: vk::ShaderStageFlags,
    pub(crate) offset: u32,
    pub(crate) values: Vec<u8>,
}

/// Returns how many bytes of `range` are not written by any chunk whose stages overlap those of
/// the range.
pub(crate) fn uncovered_bytes<'a>(
    chunks: impl IntoIterator<Item = &'a PushConstantData>,
    range: &vk::PushConstantRange,
) -> u32 {
    if range.size == 0 {
        return 0;
    }

    let mut written = RangeSet::new();

    for chunk in chunks {
        if !chunk.stage_flags.intersects(range.stage_flags) || chunk.values.is_empty() {
            continue;
        }

        let end = chunk
            .offset
            .saturating_add(u32::try_from(chunk.values.len()).unwrap_or(u32::MAX));
        written.insert(chunk.offset..end);
    }

    let target = range.offset..range.offset.saturating_add(range.size);
    let covered: u32 = written
        .overlapping(&target)
        .map(|written| written.end.min(target.end) - written.start.max(target.start))
        .sum();

    (target.end - target.start) - covered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(offset: u32, size: usize, stage_flags: vk::ShaderStageFlags) -> PushConstantData {
        PushConstantData {
            layout: vk::PipelineLayout::null(),
            stage_flags,
            offset,
            values: vec![0; size],
        }
    }

    fn range(offset: u32, size: u32) -> vk::PushConstantRange {
        vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX,
            offset,
            size,
        }
    }

    #[test]
    fn adjacent_chunks_cover_range() {
        let vertex = vk::ShaderStageFlags::VERTEX;
        let first = chunk(0, 8, vertex);
        let second = chunk(8, 8, vertex);

        assert_eq!(uncovered_bytes([&first, &second], &range(0, 16)), 0);
        assert_eq!(uncovered_bytes([&second, &first], &range(0, 16)), 0);
    }

    #[test]
    fn partial_coverage() {
        let middle = chunk(4, 4, vk::ShaderStageFlags::VERTEX);
        assert_eq!(uncovered_bytes([&middle], &range(0, 16)), 12);

        let overlapping = [
            chunk(0, 6, vk::ShaderStageFlags::VERTEX),
            chunk(2, 6, vk::ShaderStageFlags::ALL_GRAPHICS),
        ];
        assert_eq!(uncovered_bytes(&overlapping, &range(0, 16)), 8);
        assert_eq!(uncovered_bytes(&overlapping, &range(4, 2)), 0);
    }

    #[test]
    fn other_stages_and_empty_ranges() {
        let fragment = chunk(0, 16, vk::ShaderStageFlags::FRAGMENT);
        let empty = chunk(0, 0, vk::ShaderStageFlags::VERTEX);

        assert_eq!(uncovered_bytes([&fragment, &empty], &range(0, 16)), 16);
        assert_eq!(uncovered_bytes([&fragment], &range(8, 0)), 0);
    }
}
