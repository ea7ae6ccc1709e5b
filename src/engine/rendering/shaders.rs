//! ### English
//! GLSL ES 1.00 sources for the blit program.
//!
//! The vertex stage remaps texel coordinates for the output rotation. The standard kernel
//! normalizes them to `[0, 1]` there; the high-quality kernels keep texel space and normalize in
//! the fragment stage after filtering.
//!
//! ### 中文
//! blit 程序的 GLSL ES 1.00 源码。
//!
//! 顶点阶段按输出旋转重映射纹素坐标。标准滤波核在顶点阶段将其归一化到 `[0, 1]`；
//! 高质量滤波核保持纹素空间，在片元阶段滤波后再归一化。
use crate::engine::config::{FilterKernel, Rotation};

const VERTEX_DECLARATIONS: &str = "\
#version 100
attribute vec2 aVertCoord;
attribute vec2 aTexCoord;
uniform mat4 uProj;
varying vec2 vTexCoord;
";

const FRAGMENT_STANDARD: &str = "\
#version 100
precision mediump float;
uniform sampler2D uFBOTex;
varying vec2 vTexCoord;
void main() {
    gl_FragColor = texture2D(uFBOTex, vTexCoord);
}
";

/// ### English
/// sharp-bilinear-simple (TheMaister): bilinear only inside a band around texel edges.
///
/// ### 中文
/// sharp-bilinear-simple（TheMaister）：仅在纹素边缘附近的窄带内做双线性插值。
const FRAGMENT_SHARP_BILINEAR: &str = "\
#version 100
precision mediump float;
uniform sampler2D uFBOTex;
uniform vec2 uTexSize;
uniform vec2 uScale;
varying vec2 vTexCoord;
void main() {
    vec2 texel_floored = floor(vTexCoord);
    vec2 s = fract(vTexCoord);
    vec2 region_range = 0.5 - 0.5 / uScale;
    vec2 center_dist = s - 0.5;
    vec2 f = (center_dist - clamp(center_dist, -region_range, region_range)) * uScale + 0.5;
    gl_FragColor = texture2D(uFBOTex, (texel_floored + f) / uTexSize);
}
";

/// ### English
/// Iñigo Quilez's improved texture filtering: quintic smoothstep between texel centers.
///
/// ### 中文
/// Iñigo Quilez 改进的纹理过滤：在纹素中心之间做五次 smoothstep。
const FRAGMENT_QUILEZ: &str = "\
#version 100
precision highp float;
uniform sampler2D uFBOTex;
uniform vec2 uTexSize;
varying vec2 vTexCoord;
void main() {
    vec2 p = vTexCoord + 0.5;
    vec2 i = floor(p);
    vec2 f = p - i;
    f = f * f * f * (f * (f * 6.0 - 15.0) + 10.0);
    p = i + f;
    gl_FragColor = texture2D(uFBOTex, (p - 0.5) / uTexSize);
}
";

/// ### English
/// Attribute/uniform bindings of the blit program.
///
/// ### 中文
/// blit 程序的 attribute/uniform 绑定。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Binding {
    VertCoord,
    TexCoord,
    FboTex,
    Proj,
    TexSize,
    Scale,
}

impl Binding {
    pub const ALL: [Self; 6] = [
        Self::VertCoord,
        Self::TexCoord,
        Self::FboTex,
        Self::Proj,
        Self::TexSize,
        Self::Scale,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::VertCoord => "aVertCoord",
            Self::TexCoord => "aTexCoord",
            Self::FboTex => "uFBOTex",
            Self::Proj => "uProj",
            Self::TexSize => "uTexSize",
            Self::Scale => "uScale",
        }
    }

    pub fn is_attribute(self) -> bool {
        matches!(self, Self::VertCoord | Self::TexCoord)
    }

    /// ### English
    /// Whether `filter` reads this binding. A binding the kernel reads must resolve to a location;
    /// the others may be optimized out by the GLSL compiler.
    ///
    /// ### 中文
    /// `filter` 是否会读取该绑定。滤波核读取的绑定必须解析到 location；
    /// 其余绑定可能被 GLSL 编译器优化掉。
    pub fn is_required(self, filter: FilterKernel) -> bool {
        match self {
            Self::Scale => filter == FilterKernel::SharpBilinear,
            _ => true,
        }
    }
}

fn rotation_remap(rotation: Rotation) -> &'static str {
    match rotation {
        Rotation::Deg0 => "vTexCoord = vec2(aTexCoord.x, -aTexCoord.y);",
        Rotation::Deg90 => "vTexCoord = vec2(aTexCoord.y, aTexCoord.x);",
        Rotation::Deg180 => "vTexCoord = vec2(-aTexCoord.x, aTexCoord.y);",
        Rotation::Deg270 => "vTexCoord = vec2(-aTexCoord.y, -aTexCoord.x);",
    }
}

/// ### English
/// Builds the vertex stage. `uTexSize` is only declared here when this stage reads it, so the
/// uniform is never shared between stages of different default precision.
///
/// ### 中文
/// 构建顶点阶段源码。只有该阶段读取 `uTexSize` 时才在此声明，
/// 避免该 uniform 在默认精度不同的两个阶段间共享。
pub fn vertex_source(rotation: Rotation, filter: FilterKernel) -> String {
    let (declare, normalize) = if filter.is_high_quality() {
        ("", "")
    } else {
        (
            "uniform vec2 uTexSize;\n",
            "    vTexCoord = vTexCoord / uTexSize;\n",
        )
    };
    format!(
        "{VERTEX_DECLARATIONS}{declare}void main() {{\n    {remap}\n{normalize}    gl_Position = uProj * vec4(aVertCoord, 0.0, 1.0);\n}}\n",
        remap = rotation_remap(rotation),
    )
}

pub fn fragment_source(filter: FilterKernel) -> &'static str {
    match filter {
        FilterKernel::Standard => FRAGMENT_STANDARD,
        FilterKernel::SharpBilinear => FRAGMENT_SHARP_BILINEAR,
        FilterKernel::Quilez => FRAGMENT_QUILEZ,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KERNELS: [FilterKernel; 3] = [
        FilterKernel::Standard,
        FilterKernel::SharpBilinear,
        FilterKernel::Quilez,
    ];

    #[test]
    fn vertex_stage_injects_the_rotation_remap() {
        let cases = [
            (Rotation::Deg0, "vec2(aTexCoord.x, -aTexCoord.y)"),
            (Rotation::Deg90, "vec2(aTexCoord.y, aTexCoord.x)"),
            (Rotation::Deg180, "vec2(-aTexCoord.x, aTexCoord.y)"),
            (Rotation::Deg270, "vec2(-aTexCoord.y, -aTexCoord.x)"),
        ];
        for (rotation, remap) in cases {
            let source = vertex_source(rotation, FilterKernel::Standard);
            assert!(source.starts_with("#version 100\n"));
            assert!(source.contains(remap), "{rotation:?}");
            assert!(source.contains("gl_Position = uProj"));
        }
    }

    #[test]
    fn only_the_standard_kernel_normalizes_in_the_vertex_stage() {
        let normalize = "vTexCoord / uTexSize";
        assert!(vertex_source(Rotation::Deg0, FilterKernel::Standard).contains(normalize));
        assert!(!vertex_source(Rotation::Deg0, FilterKernel::SharpBilinear).contains(normalize));
        assert!(!vertex_source(Rotation::Deg0, FilterKernel::Quilez).contains(normalize));
    }

    #[test]
    fn each_kernel_has_its_own_fragment_stage() {
        assert!(!fragment_source(FilterKernel::Standard).contains("uScale"));
        assert!(fragment_source(FilterKernel::SharpBilinear).contains("region_range"));
        assert!(fragment_source(FilterKernel::Quilez).contains("f * (f * 6.0 - 15.0) + 10.0"));
        assert_eq!(
            fragment_source(FilterKernel::parse(Some("5"))),
            fragment_source(FilterKernel::Standard)
        );
    }

    #[test]
    fn required_bindings_are_declared_by_the_kernel_sources() {
        for filter in KERNELS {
            let vertex = vertex_source(Rotation::Deg90, filter);
            let fragment = fragment_source(filter);
            for binding in Binding::ALL {
                if !binding.is_required(filter) {
                    continue;
                }
                let name = binding.name();
                assert!(
                    vertex.contains(name) || fragment.contains(name),
                    "{filter:?} does not declare {name}"
                );
            }
        }
        assert!(!Binding::Scale.is_required(FilterKernel::Standard));
        assert!(Binding::Scale.is_required(FilterKernel::SharpBilinear));
    }

    #[test]
    fn no_uniform_is_declared_in_both_stages() {
        for filter in KERNELS {
            let vertex = vertex_source(Rotation::Deg0, filter);
            for binding in Binding::ALL.into_iter().filter(|b| !b.is_attribute()) {
                let declaration = format!(" {};", binding.name());
                assert!(
                    !(vertex.contains(&declaration)
                        && fragment_source(filter).contains(&declaration)),
                    "{filter:?} declares {} twice",
                    binding.name()
                );
            }
        }
    }
}
