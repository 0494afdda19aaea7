//! Demo screenshots: ten UI mockups (dialogs, forms, dashboards, tables)
//! with enough printed text for OCR and search to have something to find.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::{
    drawing::{
        draw_filled_ellipse_mut, draw_filled_rect_mut, draw_hollow_rect_mut,
        draw_line_segment_mut,
    },
    rect::Rect,
};

/// Layout units are multiplied by this so the 8px bitmap font stays legible.
const SCALE: i32 = 2;
const GLYPH_SIZE: i32 = 8;

type Mockup = fn() -> RgbImage;

const MOCKUPS: &[(&str, Mockup)] = &[
    ("error_authentication.png", error_dialog),
    ("login_form_blue_button.png", login_form),
    ("dashboard_dark_theme.png", dashboard),
    ("code_editor_error.png", code_editor),
    ("mobile_interface.png", mobile_ui),
    ("settings_toggles.png", settings_page),
    ("notification_success.png", notification_popup),
    ("data_table_users.png", data_table),
    ("file_browser_dark.png", file_browser),
    ("calendar_events.png", calendar_view),
];

/// Render every mockup as PNG into `dir`, creating it if needed.
/// Existing files with the same names are overwritten.
pub fn generate(dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let mut written = Vec::with_capacity(MOCKUPS.len());
    for (name, render) in MOCKUPS {
        let path = dir.join(name);
        render()
            .save_with_format(&path, ImageFormat::Png)
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::debug!("wrote {}", path.display());
        written.push(path);
    }

    log::info!("generated {} samples in {}", written.len(), dir.display());
    Ok(written)
}

fn color(hex: u32) -> Rgb<u8> {
    Rgb([(hex >> 16) as u8, (hex >> 8) as u8, hex as u8])
}

/// Drawing surface addressed in layout units. Boxes are `(x0, y0, x1, y1)`.
struct Canvas {
    img: RgbImage,
}

impl Canvas {
    fn new(width: u32, height: u32, background: u32) -> Self {
        let scale = SCALE as u32;
        Self {
            img: RgbImage::from_pixel(width * scale, height * scale, color(background)),
        }
    }

    fn scaled(b: (i32, i32, i32, i32)) -> Rect {
        let (x0, y0, x1, y1) = b;
        Rect::at(x0 * SCALE, y0 * SCALE).of_size(
            ((x1 - x0).max(1) * SCALE) as u32,
            ((y1 - y0).max(1) * SCALE) as u32,
        )
    }

    fn fill(&mut self, b: (i32, i32, i32, i32), fill: u32) -> &mut Self {
        draw_filled_rect_mut(&mut self.img, Self::scaled(b), color(fill));
        self
    }

    fn outline(&mut self, b: (i32, i32, i32, i32), outline: u32, width: i32) -> &mut Self {
        let (x0, y0, x1, y1) = b;
        let rect = Self::scaled(b);
        for i in 0..(width * SCALE) {
            if rect.width() as i32 <= 2 * i || rect.height() as i32 <= 2 * i {
                break;
            }
            let inner = Rect::at(x0 * SCALE + i, y0 * SCALE + i).of_size(
                ((x1 - x0) * SCALE - 2 * i) as u32,
                ((y1 - y0) * SCALE - 2 * i) as u32,
            );
            draw_hollow_rect_mut(&mut self.img, inner, color(outline));
        }
        self
    }

    fn panel(&mut self, b: (i32, i32, i32, i32), fill: u32, outline: u32) -> &mut Self {
        self.fill(b, fill).outline(b, outline, 1)
    }

    fn ellipse(&mut self, b: (i32, i32, i32, i32), fill: u32) -> &mut Self {
        let (x0, y0, x1, y1) = b;
        let center = ((x0 + x1) * SCALE / 2, (y0 + y1) * SCALE / 2);
        let (rx, ry) = ((x1 - x0) * SCALE / 2, (y1 - y0) * SCALE / 2);
        draw_filled_ellipse_mut(&mut self.img, center, rx, ry, color(fill));
        self
    }

    fn line(&mut self, from: (i32, i32), to: (i32, i32), stroke: u32, width: i32) -> &mut Self {
        for offset in 0..(width * SCALE) {
            let start = ((from.0 * SCALE) as f32, (from.1 * SCALE + offset) as f32);
            let end = ((to.0 * SCALE) as f32, (to.1 * SCALE + offset) as f32);
            draw_line_segment_mut(&mut self.img, start, end, color(stroke));
        }
        self
    }

    /// Print `text` with its top-left corner at `(x, y)`. Characters the
    /// font lacks are left blank.
    fn text(&mut self, x: i32, y: i32, text: &str, fill: u32) -> &mut Self {
        let pixel = color(fill);
        let (width, height) = (self.img.width() as i32, self.img.height() as i32);

        for (n, ch) in text.chars().enumerate() {
            let Some(glyph) = BASIC_FONTS.get(ch) else {
                continue;
            };
            let origin_x = (x + n as i32 * GLYPH_SIZE) * SCALE;
            let origin_y = y * SCALE;

            for (row, bits) in glyph.iter().enumerate() {
                for col in 0..GLYPH_SIZE {
                    if *bits & (1u8 << col) == 0 {
                        continue;
                    }
                    for dy in 0..SCALE {
                        for dx in 0..SCALE {
                            let px = origin_x + col * SCALE + dx;
                            let py = origin_y + row as i32 * SCALE + dy;
                            if (0..width).contains(&px) && (0..height).contains(&py) {
                                self.img.put_pixel(px as u32, py as u32, pixel);
                            }
                        }
                    }
                }
            }
        }
        self
    }

    fn finish(self) -> RgbImage {
        self.img
    }
}

fn error_dialog() -> RgbImage {
    let mut c = Canvas::new(600, 400, 0xf8f9fa);

    c.fill((50, 50, 550, 350), 0xffffff)
        .outline((50, 50, 550, 350), 0xdee2e6, 2);

    c.fill((50, 50, 550, 90), 0xdc3545)
        .text(70, 62, "Error", 0xffffff);

    c.ellipse((100, 130, 150, 180), 0xdc3545)
        .text(121, 151, "!", 0xffffff);

    c.text(180, 140, "Authentication Failed", 0x212529)
        .text(180, 170, "Invalid username or password.", 0x6c757d)
        .text(180, 190, "Please try again.", 0x6c757d);

    c.fill((250, 280, 350, 320), 0x0d6efd)
        .text(292, 296, "OK", 0xffffff);

    c.finish()
}

fn login_form() -> RgbImage {
    let mut c = Canvas::new(800, 600, 0xffffff);

    c.fill((0, 0, 800, 80), 0x4a90e2)
        .text(350, 36, "Login Portal", 0xffffff);

    c.panel((200, 150, 600, 450), 0xf8f9fa, 0xdee2e6);

    c.text(220, 182, "Username", 0x495057)
        .panel((220, 200, 580, 240), 0xffffff, 0xced4da)
        .text(230, 216, "user@example.com", 0x495057);

    c.text(220, 262, "Password", 0x495057)
        .panel((220, 280, 580, 320), 0xffffff, 0xced4da)
        .text(230, 296, "********", 0x495057);

    c.fill((220, 360, 580, 410), 0x0d6efd)
        .text(380, 381, "Login", 0xffffff);

    c.finish()
}

fn dashboard() -> RgbImage {
    let mut c = Canvas::new(1024, 768, 0xf5f5f5);

    c.fill((0, 0, 1024, 60), 0x1a1a1a)
        .text(40, 26, "Analytics Dashboard", 0xffffff);

    c.fill((0, 60, 200, 768), 0x2c2c2c);
    for (i, item) in ["Overview", "Reports", "Settings", "Users", "Export"]
        .iter()
        .enumerate()
    {
        c.text(20, 100 + i as i32 * 40, item, 0xb0b0b0);
    }

    c.panel((220, 80, 500, 350), 0xffffff, 0xe0e0e0)
        .text(230, 90, "Sales Chart", 0x333333);
    for (i, height) in [120, 180, 90, 160, 140].iter().enumerate() {
        let x = 250 + i as i32 * 40;
        c.fill((x, 320 - height, x + 30, 320), 0x4caf50);
    }

    c.panel((520, 80, 800, 350), 0xffffff, 0xe0e0e0)
        .text(530, 90, "User Activity", 0x333333);
    let points = [(540, 250), (600, 200), (660, 220), (720, 180), (780, 210)];
    for pair in points.windows(2) {
        c.line(pair[0], pair[1], 0xff5722, 2);
    }

    c.fill((820, 80, 1000, 140), 0xfff3cd)
        .outline((820, 80, 1000, 140), 0xffc107, 2)
        .text(830, 92, "! Warning", 0x856404)
        .text(830, 114, "Low disk space", 0x856404);

    c.finish()
}

fn code_editor() -> RgbImage {
    let mut c = Canvas::new(900, 600, 0x1e1e1e);

    c.fill((0, 0, 900, 35), 0x2d2d2d)
        .panel((10, 5, 150, 30), 0x1e1e1e, 0x444444)
        .text(20, 14, "main.py", 0xcccccc);

    for i in 1..20 {
        c.text(10, 40 + i * 20, &i.to_string(), 0x5a5a5a);
    }

    let code = [
        ("def process_data(input_file):", 0x569cd6),
        ("    try:", 0xc586c0),
        ("        with open(input_file, 'r') as f:", 0x569cd6),
        ("            data = f.read()", 0x9cdcfe),
        ("        return data", 0xc586c0),
        ("    except FileNotFoundError:", 0x569cd6),
        ("        print('Error: File not found')", 0xce9178),
        ("        return None", 0xc586c0),
        ("", 0xd4d4d4),
        ("# Main execution", 0x608b4e),
        ("if __name__ == '__main__':", 0x569cd6),
        ("    result = process_data('data.txt')", 0x9cdcfe),
        ("    if result:", 0x569cd6),
        ("        print('Success!')", 0xce9178),
    ];
    for (i, (line, stroke)) in code.iter().enumerate() {
        c.text(50, 60 + i as i32 * 20, line, *stroke);
    }

    // underline the failing print call
    c.line((114, 189), (354, 189), 0xf44747, 1);

    c.finish()
}

fn mobile_ui() -> RgbImage {
    let mut c = Canvas::new(375, 667, 0xffffff);

    c.fill((0, 0, 375, 44), 0x000000)
        .text(160, 18, "9:41 AM", 0xffffff);

    c.fill((0, 44, 375, 88), 0x4a90e2)
        .text(156, 62, "Messages", 0xffffff);

    let messages = [
        ("John Doe", "Hey, are you free today?", "2:30 PM"),
        ("Jane Smith", "Meeting at 3 PM", "1:45 PM"),
        ("Team Chat", "Project update: tests pass", "12:00 PM"),
        ("Support", "Your ticket was resolved", "Yesterday"),
    ];
    let mut y = 100;
    for (name, message, time) in messages {
        c.panel((10, y, 365, y + 70), 0xf8f9fa, 0xdee2e6)
            .text(20, y + 10, name, 0x212529)
            .text(20, y + 38, message, 0x6c757d)
            .text(290, y + 10, time, 0x6c757d);
        y += 80;
    }

    c.panel((0, 600, 375, 667), 0xf8f9fa, 0xdee2e6);
    for (i, item) in ["Home", "Search", "Add", "Notifications", "Profile"]
        .iter()
        .enumerate()
    {
        let label: String = item.chars().take(4).collect();
        c.text(20 + i as i32 * 70, 626, &label, 0x6c757d);
    }

    c.finish()
}

fn settings_page() -> RgbImage {
    let mut c = Canvas::new(800, 600, 0xffffff);

    c.text(50, 30, "Settings", 0x212529)
        .line((50, 60), (750, 60), 0xdee2e6, 1);

    let sections = [
        ("Appearance", ["Theme: Light", "Font Size: Medium", "Language: English"]),
        ("Notifications", ["Email: Enabled", "Push: Disabled", "Sound: On"]),
        ("Privacy", ["Data Collection: Limited", "Analytics: Off", "Cookies: Essential Only"]),
    ];

    let mut y = 80;
    for (section, options) in sections {
        c.text(50, y, section, 0x495057);
        y += 30;
        for option in options {
            c.panel((70, y, 730, y + 35), 0xf8f9fa, 0xdee2e6)
                .text(80, y + 14, option, 0x6c757d);

            if option.contains("Enabled") || option.ends_with(": On") {
                c.fill((650, y + 10, 690, y + 25), 0x28a745)
                    .ellipse((670, y + 10, 685, y + 25), 0xffffff);
            } else {
                c.fill((650, y + 10, 690, y + 25), 0xdc3545)
                    .ellipse((655, y + 10, 670, y + 25), 0xffffff);
            }
            y += 40;
        }
        y += 20;
    }

    c.finish()
}

fn notification_popup() -> RgbImage {
    let mut c = Canvas::new(400, 200, 0xffffff);

    c.fill((20, 20, 380, 90), 0xd4edda)
        .outline((20, 20, 380, 90), 0xc3e6cb, 2)
        .ellipse((35, 40, 55, 60), 0x28a745)
        .text(70, 35, "Success!", 0x155724)
        .text(70, 57, "File uploaded successfully", 0x155724);

    c.fill((20, 110, 380, 180), 0xd1ecf1)
        .outline((20, 110, 380, 180), 0xbee5eb, 2)
        .ellipse((35, 130, 55, 150), 0x17a2b8)
        .text(41, 136, "i", 0xffffff)
        .text(70, 125, "Information", 0x0c5460)
        .text(70, 147, "New update available", 0x0c5460);

    c.finish()
}

fn data_table() -> RgbImage {
    let mut c = Canvas::new(900, 500, 0xffffff);

    c.text(50, 24, "User Management", 0x212529);

    c.panel((50, 60, 400, 95), 0xffffff, 0xced4da)
        .text(60, 74, "Search users...", 0x6c757d);

    let columns = [60, 120, 250, 450, 560, 670];
    c.panel((50, 120, 850, 155), 0xf8f9fa, 0xdee2e6);
    for (header, x) in ["ID", "Name", "Email", "Role", "Status", "Actions"]
        .iter()
        .zip(columns)
    {
        c.text(x, 134, header, 0x495057);
    }

    let rows = [
        ["001", "Alice Johnson", "alice@example.com", "Admin", "Active", "Edit"],
        ["002", "Bob Smith", "bob@example.com", "User", "Active", "Edit"],
        ["003", "Charlie Brown", "charlie@example.com", "User", "Inactive", "Edit"],
        ["004", "Diana Prince", "diana@example.com", "Moderator", "Active", "Edit"],
    ];

    let mut y = 155;
    for row in rows {
        c.panel((50, y, 850, y + 40), 0xffffff, 0xdee2e6);
        for (value, x) in row.iter().zip(columns) {
            let status = match *value {
                "Active" => Some(0x28a745),
                "Inactive" => Some(0xdc3545),
                _ => None,
            };
            match status {
                Some(dot) => {
                    c.ellipse((x, y + 15, x + 10, y + 25), dot)
                        .text(x + 15, y + 16, value, dot);
                }
                None => {
                    c.text(x, y + 16, value, 0x495057);
                }
            }
        }
        y += 40;
    }

    c.finish()
}

fn file_browser() -> RgbImage {
    let mut c = Canvas::new(800, 600, 0x2b2b2b);

    c.fill((0, 0, 800, 40), 0x3c3c3c)
        .text(20, 16, "File Explorer", 0xcccccc);

    c.fill((0, 40, 200, 600), 0x252525);
    for (i, folder) in ["Documents", "Downloads", "Pictures", "Desktop", "Projects"]
        .iter()
        .enumerate()
    {
        let y = 60 + i as i32 * 35;
        let label = format!("> {folder}");
        if i == 2 {
            c.fill((0, y, 200, y + 30), 0x094771)
                .text(20, y + 11, &label, 0xffffff);
        } else {
            c.text(20, y + 11, &label, 0x969696);
        }
    }

    let files = [
        "screenshot_001.png",
        "vacation_photo.jpg",
        "error_log.png",
        "dashboard_view.png",
        "profile_pic.jpg",
        "chart_export.png",
    ];
    for (i, filename) in files.iter().enumerate() {
        let x = 220 + (i as i32 % 3) * 180;
        let y = 60 + (i as i32 / 3) * 150;
        let label: String = filename.chars().take(18).collect();

        c.panel((x, y, x + 150, y + 100), 0x3c3c3c, 0x555555)
            .panel((x + 55, y + 30, x + 95, y + 70), 0x4a4a4a, 0x777777)
            .text(x + 2, y + 110, &label, 0xcccccc);
    }

    c.finish()
}

fn calendar_view() -> RgbImage {
    let mut c = Canvas::new(700, 500, 0xffffff);

    c.text(300, 24, "March 2024", 0x212529);

    for (i, day) in ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"]
        .iter()
        .enumerate()
    {
        c.text(50 + i as i32 * 85, 64, day, 0x6c757d);
    }

    let mut y = 90;
    for week in 0..5 {
        for day in 0..7 {
            let date = week * 7 + day + 1;
            if date > 31 {
                continue;
            }
            let x = 50 + day * 85;
            c.panel((x, y, x + 70, y + 60), 0xffffff, 0xdee2e6)
                .text(x + 5, y + 5, &date.to_string(), 0x495057);

            let event = match date {
                5 | 12 | 20 | 28 => Some(("Meeting", 0x0d6efd)),
                15 | 22 => Some(("Deadline", 0xdc3545)),
                _ => None,
            };
            if let Some((label, fill)) = event {
                c.fill((x + 2, y + 25, x + 68, y + 42), fill)
                    .text(x + 3, y + 30, label, 0xffffff);
            }
        }
        y += 70;
    }

    c.finish()
}
