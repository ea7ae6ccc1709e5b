//! ### English
//! Render pipeline: compiles and links the blit program, resolves its bindings, uploads the
//! layout uniforms once, and fills the quad's vertex buffer.
//!
//! ### 中文
//! 渲染管线：编译并链接 blit 程序，解析其绑定，一次性上传布局相关 uniform，并填充四边形顶点缓冲。
use std::num::NonZeroU32;

use glow::HasContext as _;
use tracing::{debug, warn};

use crate::engine::config::BlitterConfig;
use crate::engine::error::{BlitterError, BlitterResult, ShaderStage};
use crate::engine::geometry::{Layout, compute_layout};
use crate::engine::handles::TextureId;

use super::shaders::{Binding, fragment_source, vertex_source};

/// ### English
/// Interleaved `[x, y, u, v]` stride in bytes.
///
/// ### 中文
/// 交错 `[x, y, u, v]` 的字节步长。
const VERTEX_STRIDE: i32 = 4 * size_of::<f32>() as i32;

/// ### English
/// Resolved attribute/uniform locations. Uniforms the kernel does not read may be `None`.
///
/// ### 中文
/// 已解析的 attribute/uniform location。滤波核不读取的 uniform 可能为 `None`。
struct Locations {
    vert_coord: u32,
    tex_coord: u32,
    fbo_tex: Option<glow::NativeUniformLocation>,
    proj: Option<glow::NativeUniformLocation>,
    tex_size: Option<glow::NativeUniformLocation>,
    scale: Option<glow::NativeUniformLocation>,
}

pub struct BlitPipeline {
    program: glow::NativeProgram,
    vbo: glow::NativeBuffer,
    /// ### English
    /// Vertex array object when the context supports one; otherwise attributes are re-specified
    /// on every blit.
    ///
    /// ### 中文
    /// 上下文支持时使用的 VAO；否则每次 blit 都重新设置 attribute。
    vao: Option<glow::NativeVertexArray>,
    vert_coord: u32,
    tex_coord: u32,
    destroyed: bool,
}

impl BlitPipeline {
    /// ### English
    /// Builds the pipeline for `config` on the current context.
    ///
    /// ### 中文
    /// 在当前上下文上为 `config` 构建管线。
    pub fn new(gl: &glow::Context, config: &BlitterConfig) -> BlitterResult<Self> {
        let vertex = vertex_source(config.rotation, config.filter);
        let fragment = fragment_source(config.filter);
        let program = link_program(gl, &vertex, fragment)?;

        let locations = match resolve_locations(gl, program, config) {
            Ok(locations) => locations,
            Err(err) => {
                unsafe { gl.delete_program(program) };
                return Err(err);
            }
        };

        let layout = compute_layout(config.viewport, config.plane, config.rotation);
        upload_uniforms(gl, program, &locations, &layout, config);

        let (vbo, vao) = match create_quad(gl, &locations, &layout) {
            Ok(buffers) => buffers,
            Err(err) => {
                unsafe { gl.delete_program(program) };
                return Err(err);
            }
        };

        debug!(
            bounds = ?layout.bounds(),
            scale = ?layout.scale,
            vao = vao.is_some(),
            "Blit pipeline ready"
        );

        Ok(Self {
            program,
            vbo,
            vao,
            vert_coord: locations.vert_coord,
            tex_coord: locations.tex_coord,
            destroyed: false,
        })
    }

    /// ### English
    /// Clears the target to opaque black.
    ///
    /// ### 中文
    /// 将目标清为不透明黑色。
    pub fn clear(&self, gl: &glow::Context) {
        unsafe {
            gl.clear_color(0.0, 0.0, 0.0, 1.0);
            gl.clear(glow::COLOR_BUFFER_BIT);
        }
    }

    /// ### English
    /// Binds the quad and `texture`, then issues a 4-vertex triangle strip.
    ///
    /// ### 中文
    /// 绑定四边形与 `texture`，然后绘制 4 顶点三角形带。
    pub fn blit(&self, gl: &glow::Context, texture: TextureId) {
        unsafe {
            gl.use_program(Some(self.program));
            match self.vao {
                Some(vao) => gl.bind_vertex_array(Some(vao)),
                None => {
                    gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vbo));
                    specify_attributes(gl, self.vert_coord, self.tex_coord);
                }
            }
            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, native_texture(texture));
            gl.draw_arrays(glow::TRIANGLE_STRIP, 0, 4);
        }
    }

    /// ### English
    /// Deletes the program and buffers (idempotent). The context must still be current.
    ///
    /// ### 中文
    /// 删除程序与缓冲（幂等）。调用时上下文必须仍为 current。
    pub fn destroy(&mut self, gl: &glow::Context) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        unsafe {
            if let Some(vao) = self.vao.take() {
                gl.delete_vertex_array(vao);
            }
            gl.delete_buffer(self.vbo);
            gl.use_program(None);
            gl.delete_program(self.program);
        }
    }
}

pub(crate) fn native_texture(texture: TextureId) -> Option<glow::NativeTexture> {
    if !texture.is_valid() {
        return None;
    }
    NonZeroU32::new(texture.0).map(glow::NativeTexture)
}

fn compile_shader(
    gl: &glow::Context,
    kind: u32,
    stage: ShaderStage,
    source: &str,
) -> BlitterResult<glow::NativeShader> {
    unsafe {
        let shader = gl
            .create_shader(kind)
            .map_err(|err| BlitterError::shader(stage, err))?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);

        let log = gl.get_shader_info_log(shader);
        if !log.is_empty() {
            debug!("Blitter {stage} shader info: {log}");
        }
        if !gl.get_shader_compile_status(shader) {
            gl.delete_shader(shader);
            return Err(BlitterError::shader(stage, log));
        }
        Ok(shader)
    }
}

fn link_program(gl: &glow::Context, vertex: &str, fragment: &str) -> BlitterResult<glow::NativeProgram> {
    let vs = compile_shader(gl, glow::VERTEX_SHADER, ShaderStage::Vertex, vertex)?;
    let fs = match compile_shader(gl, glow::FRAGMENT_SHADER, ShaderStage::Fragment, fragment) {
        Ok(fs) => fs,
        Err(err) => {
            unsafe { gl.delete_shader(vs) };
            return Err(err);
        }
    };

    unsafe {
        let program = match gl.create_program() {
            Ok(program) => program,
            Err(err) => {
                gl.delete_shader(vs);
                gl.delete_shader(fs);
                return Err(BlitterError::shader(ShaderStage::Link, err));
            }
        };
        gl.attach_shader(program, vs);
        gl.attach_shader(program, fs);
        gl.link_program(program);

        gl.detach_shader(program, vs);
        gl.detach_shader(program, fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);

        let log = gl.get_program_info_log(program);
        if !log.is_empty() {
            debug!("Blitter program info: {log}");
        }
        if !gl.get_program_link_status(program) {
            gl.delete_program(program);
            return Err(BlitterError::shader(ShaderStage::Link, log));
        }
        Ok(program)
    }
}

fn resolve_locations(
    gl: &glow::Context,
    program: glow::NativeProgram,
    config: &BlitterConfig,
) -> BlitterResult<Locations> {
    let filter = config.filter;

    let attribute = |binding: Binding| -> BlitterResult<u32> {
        unsafe { gl.get_attrib_location(program, binding.name()) }.ok_or_else(|| {
            BlitterError::shader(
                ShaderStage::Binding,
                format!("attribute {} has no location", binding.name()),
            )
        })
    };
    let uniform = |binding: Binding| -> BlitterResult<Option<glow::NativeUniformLocation>> {
        let location = unsafe { gl.get_uniform_location(program, binding.name()) };
        match location {
            Some(location) => Ok(Some(location)),
            None if binding.is_required(filter) => Err(BlitterError::shader(
                ShaderStage::Binding,
                format!("uniform {} has no location", binding.name()),
            )),
            None => Ok(None),
        }
    };

    Ok(Locations {
        vert_coord: attribute(Binding::VertCoord)?,
        tex_coord: attribute(Binding::TexCoord)?,
        fbo_tex: uniform(Binding::FboTex)?,
        proj: uniform(Binding::Proj)?,
        tex_size: uniform(Binding::TexSize)?,
        scale: uniform(Binding::Scale)?,
    })
}

fn upload_uniforms(
    gl: &glow::Context,
    program: glow::NativeProgram,
    locations: &Locations,
    layout: &Layout,
    config: &BlitterConfig,
) {
    let projection = layout.projection.as_flattened();
    let viewport = config.viewport;
    let plane = config.plane;

    unsafe {
        gl.use_program(Some(program));
        gl.uniform_1_i32(locations.fbo_tex.as_ref(), 0);
        gl.viewport(0, 0, viewport.width as i32, viewport.height as i32);
        gl.uniform_matrix_4_f32_slice(locations.proj.as_ref(), false, projection);
        if let Some(scale) = locations.scale.as_ref() {
            gl.uniform_2_f32(Some(scale), layout.scale[0], layout.scale[1]);
        }
        if let Some(tex_size) = locations.tex_size.as_ref() {
            gl.uniform_2_f32(Some(tex_size), plane.width as f32, plane.height as f32);
        }
    }
}

fn create_quad(
    gl: &glow::Context,
    locations: &Locations,
    layout: &Layout,
) -> BlitterResult<(glow::NativeBuffer, Option<glow::NativeVertexArray>)> {
    let bytes: Vec<u8> = layout
        .vertex_data()
        .iter()
        .flat_map(|v| v.to_ne_bytes())
        .collect();

    let vao_supported = gl.version().major >= 3
        || gl
            .supported_extensions()
            .contains("GL_OES_vertex_array_object");

    unsafe {
        let vbo = gl.create_buffer().map_err(BlitterError::resource_load)?;

        let vao = if vao_supported {
            match gl.create_vertex_array() {
                Ok(vao) => Some(vao),
                Err(err) => {
                    warn!("Vertex array objects unavailable, binding attributes per draw: {err}");
                    None
                }
            }
        } else {
            None
        };

        if vao.is_some() {
            gl.bind_vertex_array(vao);
        }
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
        specify_attributes(gl, locations.vert_coord, locations.tex_coord);
        gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, &bytes, glow::STATIC_DRAW);
        if vao.is_some() {
            gl.bind_vertex_array(None);
        }
        Ok((vbo, vao))
    }
}

unsafe fn specify_attributes(gl: &glow::Context, vert_coord: u32, tex_coord: u32) {
    unsafe {
        gl.enable_vertex_attrib_array(vert_coord);
        gl.enable_vertex_attrib_array(tex_coord);
        gl.vertex_attrib_pointer_f32(vert_coord, 2, glow::FLOAT, false, VERTEX_STRIDE, 0);
        gl.vertex_attrib_pointer_f32(
            tex_coord,
            2,
            glow::FLOAT,
            false,
            VERTEX_STRIDE,
            2 * size_of::<f32>() as i32,
        );
    }
}
