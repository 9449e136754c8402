/// Scale information for pyramid levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleLevel {
    pub level: usize,
    pub scale: f32,
    pub width: usize,
    pub height: usize,
}

/// Corner found on one level, in that level's pixel grid
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    pub x: usize,
    pub y: usize,
    pub fast_score: u8,
}
