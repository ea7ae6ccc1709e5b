//! ### English
//! Aspect-correct quad layout and orthographic projection for the blit pass.
//!
//! Pure math: no GL context needed, so everything here is unit tested directly.
//!
//! ### 中文
//! blit 通道使用的保持宽高比的四边形布局与正交投影。
//!
//! 纯数学计算：不需要 GL 上下文，因此这里的逻辑都直接做单元测试。
use dpi::PhysicalSize;

use super::config::Rotation;

/// ### English
/// Column-major 4x4 matrix (`m[column][row]`), uploaded with `transpose = false`.
///
/// ### 中文
/// 列主序 4x4 矩阵（`m[列][行]`），上传时 `transpose = false`。
pub type Mat4 = [[f32; 4]; 4];

/// ### English
/// One vertex of the blit quad: viewport-pixel position plus unnormalized texel coordinate.
///
/// ### 中文
/// blit 四边形的一个顶点：视口像素坐标 + 未归一化的纹素坐标。
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub tex_coord: [f32; 2],
}

/// ### English
/// Output of [`compute_layout`].
///
/// ### 中文
/// [`compute_layout`] 的输出。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Layout {
    /// ### English
    /// Orthographic projection mapping viewport pixels to clip space.
    ///
    /// ### 中文
    /// 将视口像素映射到裁剪空间的正交投影。
    pub projection: Mat4,
    /// ### English
    /// Triangle-strip quad (bottom-left, top-left, bottom-right, top-right).
    ///
    /// ### 中文
    /// 三角形带四边形（左下、左上、右下、右上）。
    pub quad: [QuadVertex; 4],
    /// ### English
    /// Fitted size divided by plane size, per axis; read by high-quality kernels.
    ///
    /// ### 中文
    /// 每个轴上“适配后尺寸 / plane 尺寸”；供高质量滤波核使用。
    pub scale: [f32; 2],
}

impl Layout {
    /// ### English
    /// Interleaved `[x, y, u, v]` vertex data for the VBO (stride 16 bytes).
    ///
    /// ### 中文
    /// 交错排列的 `[x, y, u, v]` 顶点数据，用于 VBO（步长 16 字节）。
    pub fn vertex_data(&self) -> [f32; 16] {
        let mut out = [0.0f32; 16];
        for (chunk, vertex) in out.chunks_exact_mut(4).zip(self.quad.iter()) {
            chunk[0] = vertex.position[0];
            chunk[1] = vertex.position[1];
            chunk[2] = vertex.tex_coord[0];
            chunk[3] = vertex.tex_coord[1];
        }
        out
    }

    /// ### English
    /// Axis-aligned bounds of the quad as `(left, bottom, right, top)`.
    ///
    /// ### 中文
    /// 四边形的轴对齐包围盒 `(left, bottom, right, top)`。
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        let xs = self.quad.map(|v| v.position[0]);
        let ys = self.quad.map(|v| v.position[1]);
        let min = |a: [f32; 4]| a.into_iter().fold(f32::INFINITY, f32::min);
        let max = |a: [f32; 4]| a.into_iter().fold(f32::NEG_INFINITY, f32::max);
        (min(xs), min(ys), max(xs), max(ys))
    }
}

/// ### English
/// Orthographic projection for the box `left..right` × `bottom..top`; depth maps to `-z`.
///
/// ### 中文
/// 对 `left..right` × `bottom..top` 区域的正交投影；深度映射为 `-z`。
pub fn ortho(left: f32, right: f32, bottom: f32, top: f32) -> Mat4 {
    let mut m = [[0.0f32; 4]; 4];
    m[0][0] = 2.0 / (right - left);
    m[1][1] = 2.0 / (top - bottom);
    m[2][2] = -1.0;
    m[3][0] = -(right + left) / (right - left);
    m[3][1] = -(top + bottom) / (top - bottom);
    m[3][3] = 1.0;
    m
}

/// ### English
/// Whole-pixel span of `fitted` centered in `extent`; the two gaps differ by at most one pixel.
///
/// ### 中文
/// `fitted` 在 `extent` 中居中后的整像素区间；两侧留白最多相差一个像素。
fn centered_span(fitted: f64, extent: u32) -> (f32, f32) {
    let span = (fitted.trunc() as u32).min(extent);
    let start = (extent - span) / 2;
    (start as f32, (start + span) as f32)
}

/// ### English
/// Computes the letterboxed quad, projection, and texel scale.
///
/// Sideways rotations compare aspect ratios against the swapped plane, and express texel extents
/// in that rotated frame so the vertex-stage remap lands on the plane's true extent. Quad edges are
/// truncated to whole pixels.
///
/// #### Parameters
/// - `viewport`: Scanout size in pixels (non-zero).
/// - `plane`: Producer plane size in pixels (non-zero).
/// - `rotation`: Output rotation.
///
/// ### 中文
/// 计算带黑边的四边形、投影矩阵以及纹素缩放。
///
/// 侧向旋转时用交换宽高后的 plane 比较宽高比，并在旋转后的坐标系中表达纹素范围，
/// 使顶点阶段的重映射恰好覆盖 plane 的真实范围。四边形边缘截断到整像素。
///
/// #### 参数
/// - `viewport`：扫描输出尺寸（像素，非 0）。
/// - `plane`：生产者 plane 尺寸（像素，非 0）。
/// - `rotation`：输出旋转。
pub fn compute_layout(
    viewport: PhysicalSize<u32>,
    plane: PhysicalSize<u32>,
    rotation: Rotation,
) -> Layout {
    let (plane_w, plane_h) = if rotation.is_sideways() {
        (f64::from(plane.height), f64::from(plane.width))
    } else {
        (f64::from(plane.width), f64::from(plane.height))
    };
    let view_w = f64::from(viewport.width);
    let view_h = f64::from(viewport.height);

    let (fit_w, fit_h) = if view_w / view_h > plane_w / plane_h {
        /* ### English
        Viewport is wider: touch top and bottom, pillarbox left and right.

        ### 中文
        视口更宽：贴合上下边，左右留黑边。
        */
        (plane_w * view_h / plane_h, view_h)
    } else {
        (view_w, plane_h * view_w / plane_w)
    };

    let (left, right) = centered_span(fit_w, viewport.width);
    let (bottom, top) = centered_span(fit_h, viewport.height);
    let tex_w = plane_w as f32;
    let tex_h = plane_h as f32;

    let quad = [
        QuadVertex {
            position: [left, bottom],
            tex_coord: [0.0, 0.0],
        },
        QuadVertex {
            position: [left, top],
            tex_coord: [0.0, tex_h],
        },
        QuadVertex {
            position: [right, bottom],
            tex_coord: [tex_w, 0.0],
        },
        QuadVertex {
            position: [right, top],
            tex_coord: [tex_w, tex_h],
        },
    ];

    Layout {
        projection: ortho(0.0, view_w as f32, 0.0, view_h as f32),
        quad,
        scale: [(fit_w / plane_w) as f32, (fit_h / plane_h) as f32],
    }
}
