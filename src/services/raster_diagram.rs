//! 栅格配图服务（第二阶段）- 业务能力层
//!
//! 模型只返回一段 JSON 绘图指令，只允许少数几种图元，由本模块用 `imageproc` 画到
//! `RgbImage` 上，再编码成 PNG。模型输出从不被执行。
//!
//! 坐标系：逻辑画布 0-100，y 轴向上，映射到画布中央的正方形区域（保证圆是圆的）。
//! 任何失败都会生成一张占位图（题号写在 PNG 文本块里），保证这一阶段结束后图片一定存在。

use anyhow::{bail, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut, draw_polygon_mut,
};
use imageproc::point::Point;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::infrastructure::json_extract::{extract_fenced_block, extract_json};
use crate::infrastructure::TextOracle;
use crate::models::QuestionRecord;

pub const CANVAS_WIDTH: u32 = 800;
pub const CANVAS_HEIGHT: u32 = 600;
pub const MAX_SHAPES: usize = 256;
pub const MAX_POINTS_PER_SHAPE: usize = 64;

/// 逻辑坐标上限
const LOGICAL_EXTENT: f64 = 100.0;
const MARGIN: f64 = 20.0;

/// 图片在输出目录下的子目录
pub const IMAGES_SUBDIR: &str = "images";

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([0, 0, 0]);
const FILL: Rgb<u8> = Rgb([205, 205, 205]);
const FRAME: Rgb<u8> = Rgb([120, 120, 120]);

type Coord = [f64; 2];

/// 允许的图元
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Shape {
    Line {
        from: Coord,
        to: Coord,
    },
    Polyline {
        points: Vec<Coord>,
    },
    Polygon {
        points: Vec<Coord>,
        #[serde(default)]
        fill: bool,
    },
    Rect {
        at: Coord,
        width: f64,
        height: f64,
        #[serde(default)]
        fill: bool,
    },
    Circle {
        center: Coord,
        radius: f64,
        #[serde(default)]
        fill: bool,
    },
    Point {
        at: Coord,
    },
    Axes {
        #[serde(default = "default_origin")]
        origin: Coord,
        #[serde(default)]
        ticks: bool,
    },
}

fn default_origin() -> Coord {
    [10.0, 10.0]
}

/// 模型返回的绘图指令
#[derive(Debug, Default, Deserialize)]
struct DrawingProgram {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    shapes: Vec<Value>,
}

/// 栅格配图服务
pub struct DiagramRenderer {
    oracle: Arc<dyn TextOracle>,
    images_dir: PathBuf,
}

impl DiagramRenderer {
    /// `output_dir` 是文档所在目录，图片写到它下面的 `images/`
    pub fn new(oracle: Arc<dyn TextOracle>, output_dir: &Path) -> Self {
        Self {
            oracle,
            images_dir: output_dir.join(IMAGES_SUBDIR),
        }
    }

    /// 为题目渲染一张 PNG
    ///
    /// 未标记 `needs_python_diagram` 时原样返回；否则每次调用恰好写一个图片文件
    pub async fn render(&self, mut record: QuestionRecord, topic: &str) -> QuestionRecord {
        if !record.needs_python_diagram {
            return record;
        }

        let file_name = image_file_name(&record.question_id);
        let path = self.images_dir.join(&file_name);

        let png = match self.draw_from_oracle(&record, topic).await {
            Ok(png) => {
                info!("🖼️ {} 栅格图生成成功", record.question_id);
                Some(png)
            }
            Err(e) => {
                warn!("⚠️ {} 栅格图生成失败，使用占位图: {:#}", record.question_id, e);
                placeholder_png(&record.question_id)
                    .map_err(|e| error!("❌ 占位图编码失败: {:#}", e))
                    .ok()
            }
        };

        match png.map(|bytes| self.write_image(&path, &bytes)) {
            Some(Ok(())) => {
                debug!("图片已写入: {}", path.display());
                record.image_path = Some(format!("{}/{}", IMAGES_SUBDIR, file_name));
            }
            Some(Err(e)) => error!("❌ 写入图片失败: {:#}", e),
            None => {}
        }
        record
    }

    async fn draw_from_oracle(&self, record: &QuestionRecord, topic: &str) -> Result<Vec<u8>> {
        let prompt = build_drawing_prompt(&record.question_text, topic);
        let response = self.oracle.complete(&prompt).await?;
        let program = parse_program(&response)?;

        let mut canvas = Canvas::new();
        let drawn = canvas.run(&program.shapes);
        if drawn == 0 {
            bail!("绘图指令中没有可用的图形");
        }
        debug!("{} 绘制了 {} 个图形", record.question_id, drawn);

        let title = program
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| default_title(&record.question_id));
        canvas.encode_png(&title, None)
    }

    fn write_image(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.images_dir)
            .with_context(|| format!("创建目录失败: {}", self.images_dir.display()))?;
        std::fs::write(path, bytes).with_context(|| format!("写入失败: {}", path.display()))
    }
}

/// `diagram_<id 小写>.png`
pub fn image_file_name(question_id: &str) -> String {
    format!("diagram_{}.png", question_id.to_lowercase())
}

fn default_title(question_id: &str) -> String {
    format!("Diagram for {}", question_id)
}

fn build_drawing_prompt(question_text: &str, topic: &str) -> String {
    format!(
        r#"Describe a clear, publication-quality diagram for this question as a drawing program:

Question: {question_text}
Topic: {topic}

The canvas is 100 x 100 units, origin at the bottom-left, y pointing up.
Only these shape kinds are allowed:
- {{"kind": "line", "from": [x, y], "to": [x, y]}}
- {{"kind": "polyline", "points": [[x, y], ...]}}
- {{"kind": "polygon", "points": [[x, y], ...], "fill": false}}
- {{"kind": "rect", "at": [x, y], "width": w, "height": h, "fill": false}}
- {{"kind": "circle", "center": [x, y], "radius": r, "fill": false}}
- {{"kind": "point", "at": [x, y]}}
- {{"kind": "axes", "origin": [x, y], "ticks": true}}

At most {MAX_SHAPES} shapes and {MAX_POINTS_PER_SHAPE} points per shape.

Return ONLY valid JSON:
{{
    "title": "Short caption",
    "shapes": [
        {{"kind": "axes", "origin": [10, 10], "ticks": true}},
        {{"kind": "polyline", "points": [[10, 10], [50, 80], [90, 10]]}}
    ]
}}"#
    )
}

/// 解析绘图指令：优先取代码块，再做容错 JSON 提取；也接受直接的图元数组
fn parse_program(response: &str) -> Result<DrawingProgram> {
    let value = extract_fenced_block(response)
        .and_then(|block| extract_json(&block))
        .or_else(|| extract_json(response))
        .context("响应中没有找到绘图指令")?;

    match value {
        Value::Array(shapes) => Ok(DrawingProgram {
            title: None,
            shapes,
        }),
        Value::Object(_) => serde_json::from_value(value).context("绘图指令格式不正确"),
        _ => bail!("绘图指令必须是 JSON 对象或数组"),
    }
}

/// 占位图：灰色边框 + 对角线，题号写进 `Title` / `Description` 文本块
pub fn placeholder_png(question_id: &str) -> Result<Vec<u8>> {
    let mut canvas = Canvas::new();
    let (w, h) = (CANVAS_WIDTH as f32 - 11.0, CANVAS_HEIGHT as f32 - 11.0);
    let frame = [(10.0, 10.0), (w, 10.0), (w, h), (10.0, h)];
    canvas.stroke(&frame, true, FRAME);
    canvas.line(frame[0], frame[2], FRAME);
    canvas.line(frame[1], frame[3], FRAME);
    let description = format!("Placeholder: the diagram for {} could not be drawn", question_id);
    canvas.encode_png(&default_title(question_id), Some(&description))
}

type Px = (f32, f32);

/// 画布：`RgbImage` + 逻辑坐标映射
struct Canvas {
    image: RgbImage,
}

impl Canvas {
    fn new() -> Self {
        Self {
            image: RgbImage::from_pixel(CANVAS_WIDTH, CANVAS_HEIGHT, BACKGROUND),
        }
    }

    /// 逻辑坐标 -> 像素坐标
    fn to_px(&self, [x, y]: Coord) -> Px {
        let scale = self.scale();
        let left = (CANVAS_WIDTH as f64 - LOGICAL_EXTENT * scale) / 2.0;
        let bottom = CANVAS_HEIGHT as f64 - MARGIN;
        let x = x.clamp(0.0, LOGICAL_EXTENT);
        let y = y.clamp(0.0, LOGICAL_EXTENT);
        (
            (left + x * scale).round() as f32,
            (bottom - y * scale).round() as f32,
        )
    }

    fn scale(&self) -> f64 {
        let usable = (CANVAS_WIDTH.min(CANVAS_HEIGHT) as f64 - 2.0 * MARGIN).max(1.0);
        usable / LOGICAL_EXTENT
    }

    /// 执行绘图指令，返回实际画出的图形数量
    fn run(&mut self, shapes: &[Value]) -> usize {
        if shapes.len() > MAX_SHAPES {
            warn!("图形数量 {} 超过上限，只绘制前 {} 个", shapes.len(), MAX_SHAPES);
        }

        let mut drawn = 0;
        for raw in shapes.iter().take(MAX_SHAPES) {
            match serde_json::from_value::<Shape>(raw.clone()) {
                Ok(shape) => {
                    if self.draw(shape) {
                        drawn += 1;
                    }
                }
                Err(e) => warn!("跳过不支持的图形: {}", e),
            }
        }
        drawn
    }

    fn draw(&mut self, shape: Shape) -> bool {
        match shape {
            Shape::Line { from, to } => {
                let (a, b) = (self.to_px(from), self.to_px(to));
                self.line(a, b, INK);
            }
            Shape::Polyline { points } => {
                let points = self.points_px(points);
                if points.len() < 2 {
                    return false;
                }
                self.stroke(&points, false, INK);
            }
            Shape::Polygon { points, fill } => {
                let points = self.points_px(points);
                if points.len() < 3 {
                    return false;
                }
                if fill {
                    self.fill_polygon(&points, FILL);
                }
                self.stroke(&points, true, INK);
            }
            Shape::Rect {
                at,
                width,
                height,
                fill,
            } => {
                if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
                    return false;
                }
                let [x, y] = at;
                let corners = [
                    [x, y],
                    [x + width, y],
                    [x + width, y + height],
                    [x, y + height],
                ];
                let points: Vec<Px> = corners.iter().map(|c| self.to_px(*c)).collect();
                if fill {
                    self.fill_polygon(&points, FILL);
                }
                self.stroke(&points, true, INK);
            }
            Shape::Circle {
                center,
                radius,
                fill,
            } => {
                if !radius.is_finite() || radius <= 0.0 {
                    return false;
                }
                let (cx, cy) = self.to_px(center);
                let center = (cx as i32, cy as i32);
                let r = ((radius.min(LOGICAL_EXTENT) * self.scale()).round() as i32).max(1);
                if fill {
                    draw_filled_circle_mut(&mut self.image, center, r, FILL);
                }
                draw_hollow_circle_mut(&mut self.image, center, r, INK);
                if r > 1 {
                    draw_hollow_circle_mut(&mut self.image, center, r - 1, INK);
                }
            }
            Shape::Point { at } => {
                let (x, y) = self.to_px(at);
                draw_filled_circle_mut(&mut self.image, (x as i32, y as i32), 4, INK);
            }
            Shape::Axes { origin, ticks } => self.axes(origin, ticks),
        }
        true
    }

    fn points_px(&self, mut points: Vec<Coord>) -> Vec<Px> {
        if points.len() > MAX_POINTS_PER_SHAPE {
            warn!("点数 {} 超过上限，截断到 {}", points.len(), MAX_POINTS_PER_SHAPE);
            points.truncate(MAX_POINTS_PER_SHAPE);
        }
        points.into_iter().map(|p| self.to_px(p)).collect()
    }

    /// 线宽 2 像素
    fn line(&mut self, (x0, y0): Px, (x1, y1): Px, color: Rgb<u8>) {
        draw_line_segment_mut(&mut self.image, (x0, y0), (x1, y1), color);
        draw_line_segment_mut(&mut self.image, (x0 + 1.0, y0), (x1 + 1.0, y1), color);
        draw_line_segment_mut(&mut self.image, (x0, y0 + 1.0), (x1, y1 + 1.0), color);
    }

    fn stroke(&mut self, points: &[Px], closed: bool, color: Rgb<u8>) {
        for pair in points.windows(2) {
            self.line(pair[0], pair[1], color);
        }
        if closed && points.len() > 2 {
            if let (Some(&first), Some(&last)) = (points.first(), points.last()) {
                self.line(last, first, color);
            }
        }
    }

    /// 退化的多边形（映射后不足三个不同顶点）不填充
    fn fill_polygon(&mut self, points: &[Px], color: Rgb<u8>) {
        let mut poly: Vec<Point<i32>> = Vec::with_capacity(points.len());
        for &(x, y) in points {
            let p = Point::new(x as i32, y as i32);
            if poly.last() != Some(&p) {
                poly.push(p);
            }
        }
        // draw_polygon_mut 要求首尾不重合
        while poly.len() > 1 && poly.first() == poly.last() {
            poly.pop();
        }
        if poly.len() >= 3 {
            draw_polygon_mut(&mut self.image, &poly, color);
        }
    }

    fn axes(&mut self, origin: Coord, ticks: bool) {
        let [ox, oy] = origin;
        let x_axis = (self.to_px([0.0, oy]), self.to_px([LOGICAL_EXTENT, oy]));
        let y_axis = (self.to_px([ox, 0.0]), self.to_px([ox, LOGICAL_EXTENT]));
        self.line(x_axis.0, x_axis.1, INK);
        self.line(y_axis.0, y_axis.1, INK);

        if ticks {
            for step in (0..=100).step_by(10) {
                let v = step as f64;
                let (tx, ty) = self.to_px([v, oy]);
                self.line((tx, ty - 4.0), (tx, ty + 4.0), INK);
                let (tx, ty) = self.to_px([ox, v]);
                self.line((tx - 4.0, ty), (tx + 4.0, ty), INK);
            }
        }
    }

    fn encode_png(&self, title: &str, description: Option<&str>) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut buf, self.image.width(), self.image.height());
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            encoder
                .add_text_chunk("Title".to_string(), title.to_string())
                .context("写入 PNG 文本块失败")?;
            if let Some(description) = description {
                encoder
                    .add_text_chunk("Description".to_string(), description.to_string())
                    .context("写入 PNG 文本块失败")?;
            }
            let mut writer = encoder.write_header().context("写入 PNG 头失败")?;
            writer
                .write_image_data(self.image.as_raw())
                .context("写入 PNG 像素失败")?;
        }
        Ok(buf)
    }
}
