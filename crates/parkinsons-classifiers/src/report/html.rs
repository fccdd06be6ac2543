//! Minimal HTML report builder: titled sections of maud markup and
//! embedded plotly figures, rendered into a single standalone page.
use std::fs;
use std::path::Path;

use maud::{html, Markup, PreEscaped, DOCTYPE};
use plotly::Plot;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.12.1.min.js";

pub struct ReportSection {
    title: String,
    blocks: Vec<Markup>,
    n_plots: usize,
}

impl ReportSection {
    pub fn new(title: &str) -> Self {
        ReportSection {
            title: title.to_string(),
            blocks: Vec::new(),
            n_plots: 0,
        }
    }

    pub fn add_content(&mut self, content: Markup) {
        self.blocks.push(content);
    }

    pub fn add_plot(&mut self, plot: Plot) {
        let div_id = format!(
            "plot-{}-{}",
            self.title.to_lowercase().replace(|c: char| !c.is_alphanumeric(), "-"),
            self.n_plots
        );
        self.n_plots += 1;
        self.blocks.push(html! {
            div class="plot" { (PreEscaped(plot.to_inline_html(Some(&div_id)))) }
        });
    }

    fn render(&self) -> Markup {
        html! {
            section {
                h2 { (self.title) }
                @for block in &self.blocks {
                    (block)
                }
            }
        }
    }
}

pub struct Report {
    software_name: String,
    version: String,
    title: String,
    sections: Vec<ReportSection>,
}

impl Report {
    pub fn new(software_name: &str, version: &str, title: &str) -> Self {
        Report {
            software_name: software_name.to_string(),
            version: version.to_string(),
            title: title.to_string(),
            sections: Vec::new(),
        }
    }

    pub fn add_section(&mut self, section: ReportSection) {
        self.sections.push(section);
    }

    pub fn render(&self) -> String {
        let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let page = html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="utf-8";
                    title { (self.title) }
                    script src=(PLOTLY_CDN) {}
                    style {
                        "body { font-family: sans-serif; margin: 2em auto; max-width: 1100px; }
                        table { border-collapse: collapse; }
                        th, td { border: 1px solid #ccc; padding: 4px 10px; text-align: right; }
                        th:first-child, td:first-child { text-align: left; }
                        .plot { margin: 1em 0; }"
                    }
                }
                body {
                    h1 { (self.title) }
                    p class="meta" {
                        (self.software_name) " v" (self.version) " | generated " (generated)
                    }
                    @for section in &self.sections {
                        (section.render())
                    }
                }
            }
        };
        page.into_string()
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        fs::write(path, self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_sections_in_order() {
        let mut report = Report::new("parkinsons-classifiers", "0.1.0", "Test Report");
        let mut a = ReportSection::new("First");
        a.add_content(html! { p { "alpha" } });
        let mut b = ReportSection::new("Second");
        b.add_content(html! { p { "beta" } });
        report.add_section(a);
        report.add_section(b);

        let page = report.render();
        let first = page.find("First").unwrap();
        let second = page.find("Second").unwrap();
        assert!(first < second);
        assert!(page.contains("alpha") && page.contains("beta"));
    }
}
