/// Spreads a bounded sample budget evenly across a video.
///
/// With a known frame count, every `stride`-th frame is taken until the
/// budget is spent (`stride = total / min(budget, total)`). When the
/// container doesn't report a frame count, the stride falls back to 1 and
/// the budget alone bounds the sample.
pub struct FrameSampler {
    stride: usize,
    budget: usize,
    taken: usize,
}

impl FrameSampler {
    pub fn new(total_frames: usize, budget: usize) -> Self {
        assert!(budget > 0, "frame budget must be positive");
        let stride = if total_frames == 0 {
            1
        } else {
            (total_frames / budget.min(total_frames)).max(1)
        };
        Self {
            stride,
            budget,
            taken: 0,
        }
    }

    /// Whether the frame at `frame_index` (decode order, 0-based) is part of
    /// the sample. Call once per frame, in order.
    pub fn accepts(&mut self, frame_index: usize) -> bool {
        if self.taken >= self.budget || frame_index % self.stride != 0 {
            return false;
        }
        self.taken += 1;
        true
    }

    pub fn taken(&self) -> usize {
        self.taken
    }

    pub fn stride(&self) -> usize {
        self.stride
    }
}
