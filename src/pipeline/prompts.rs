use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};

use crate::config::{AppConfig, PromptsSection};

pub const DEFAULT_PROMPTS_DIR: &str = "prompts";

pub const DEFAULT_SYSTEM: &str = "system.txt";
pub const DEFAULT_TRANSLATE: &str = "translate.txt";
pub const DEFAULT_SUMMARIZE_ORIGINAL: &str = "summarize_original.txt";
pub const DEFAULT_SUMMARIZE_TRANSLATED: &str = "summarize_translated.txt";
pub const DEFAULT_COMPARE: &str = "compare.txt";
pub const DEFAULT_FOCUSED_RETRANSLATE: &str = "focused_retranslate.txt";
pub const DEFAULT_EXCERPT_RETRANSLATE: &str = "excerpt_retranslate.txt";
pub const DEFAULT_REVERSE_KEYWORDS: &str = "reverse_keywords.txt";
pub const DEFAULT_IMPROVE_SEGMENTS: &str = "improve_segments.txt";
pub const DEFAULT_IMPROVE_ALL: &str = "improve_all.txt";

/// Delimiter the segment prompts ask the model to put between segments.
pub const SEGMENT_DELIMITER: &str = "<<<END>>>";

#[derive(Clone, Debug)]
pub struct PromptSet {
    pub system: String,
    pub translate: String,
    pub summarize_original: String,
    pub summarize_translated: String,
    pub compare: String,
    pub focused_retranslate: String,
    pub excerpt_retranslate: String,
    pub reverse_keywords: String,
    pub improve_segments: String,
    pub improve_all: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_TEXT.to_string(),
            translate: DEFAULT_TRANSLATE_TEXT.to_string(),
            summarize_original: DEFAULT_SUMMARIZE_ORIGINAL_TEXT.to_string(),
            summarize_translated: DEFAULT_SUMMARIZE_TRANSLATED_TEXT.to_string(),
            compare: DEFAULT_COMPARE_TEXT.to_string(),
            focused_retranslate: DEFAULT_FOCUSED_RETRANSLATE_TEXT.to_string(),
            excerpt_retranslate: DEFAULT_EXCERPT_RETRANSLATE_TEXT.to_string(),
            reverse_keywords: DEFAULT_REVERSE_KEYWORDS_TEXT.to_string(),
            improve_segments: DEFAULT_IMPROVE_SEGMENTS_TEXT.to_string(),
            improve_all: DEFAULT_IMPROVE_ALL_TEXT.to_string(),
        }
    }
}

impl PromptSet {
    /// Templates named in `[prompts]` are read relative to the config file and must exist.
    /// Unnamed ones come from `prompts/<default file>` beside the config when present, else
    /// from the built-in text.
    pub fn load(config_path: &Path, cfg: &AppConfig) -> anyhow::Result<Self> {
        let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
        let p = &cfg.prompts;
        let d = Self::default();
        Ok(Self {
            system: read_prompt(config_dir, p, "system", DEFAULT_SYSTEM, d.system)?,
            translate: read_prompt(config_dir, p, "translate", DEFAULT_TRANSLATE, d.translate)?,
            summarize_original: read_prompt(
                config_dir,
                p,
                "summarize_original",
                DEFAULT_SUMMARIZE_ORIGINAL,
                d.summarize_original,
            )?,
            summarize_translated: read_prompt(
                config_dir,
                p,
                "summarize_translated",
                DEFAULT_SUMMARIZE_TRANSLATED,
                d.summarize_translated,
            )?,
            compare: read_prompt(config_dir, p, "compare", DEFAULT_COMPARE, d.compare)?,
            focused_retranslate: read_prompt(
                config_dir,
                p,
                "focused_retranslate",
                DEFAULT_FOCUSED_RETRANSLATE,
                d.focused_retranslate,
            )?,
            excerpt_retranslate: read_prompt(
                config_dir,
                p,
                "excerpt_retranslate",
                DEFAULT_EXCERPT_RETRANSLATE,
                d.excerpt_retranslate,
            )?,
            reverse_keywords: read_prompt(
                config_dir,
                p,
                "reverse_keywords",
                DEFAULT_REVERSE_KEYWORDS,
                d.reverse_keywords,
            )?,
            improve_segments: read_prompt(
                config_dir,
                p,
                "improve_segments",
                DEFAULT_IMPROVE_SEGMENTS,
                d.improve_segments,
            )?,
            improve_all: read_prompt(
                config_dir,
                p,
                "improve_all",
                DEFAULT_IMPROVE_ALL,
                d.improve_all,
            )?,
        })
    }
}

fn read_prompt(
    config_dir: &Path,
    p: &PromptsSection,
    key: &str,
    default_filename: &str,
    builtin: String,
) -> anyhow::Result<String> {
    let configured = match key {
        "system" => p.system.clone(),
        "translate" => p.translate.clone(),
        "summarize_original" => p.summarize_original.clone(),
        "summarize_translated" => p.summarize_translated.clone(),
        "compare" => p.compare.clone(),
        "focused_retranslate" => p.focused_retranslate.clone(),
        "excerpt_retranslate" => p.excerpt_retranslate.clone(),
        "reverse_keywords" => p.reverse_keywords.clone(),
        "improve_segments" => p.improve_segments.clone(),
        "improve_all" => p.improve_all.clone(),
        other => return Err(anyhow!("unknown prompt key: {other}")),
    };

    let Some(path) = configured.filter(|s| !s.trim().is_empty()) else {
        let fallback = config_dir.join(DEFAULT_PROMPTS_DIR).join(default_filename);
        if fallback.is_file() {
            return std::fs::read_to_string(&fallback)
                .with_context(|| format!("read prompt: {}", fallback.display()));
        }
        return Ok(builtin);
    };

    let mut p = PathBuf::from(path);
    if p.is_relative() {
        p = config_dir.join(&p);
    }
    if !p.exists() {
        return Err(anyhow!(
            "prompt file not found for {key}: {} (run: lt-translator init-config)",
            p.display()
        ));
    }
    std::fs::read_to_string(&p).with_context(|| format!("read prompt: {}", p.display()))
}

pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (k, v) in vars {
        let pat = format!("{{{{{k}}}}}");
        out = out.replace(&pat, v);
    }
    out
}

pub fn default_prompt_files() -> Vec<(&'static str, &'static str)> {
    vec![
        (DEFAULT_SYSTEM, DEFAULT_SYSTEM_TEXT),
        (DEFAULT_TRANSLATE, DEFAULT_TRANSLATE_TEXT),
        (DEFAULT_SUMMARIZE_ORIGINAL, DEFAULT_SUMMARIZE_ORIGINAL_TEXT),
        (DEFAULT_SUMMARIZE_TRANSLATED, DEFAULT_SUMMARIZE_TRANSLATED_TEXT),
        (DEFAULT_COMPARE, DEFAULT_COMPARE_TEXT),
        (DEFAULT_FOCUSED_RETRANSLATE, DEFAULT_FOCUSED_RETRANSLATE_TEXT),
        (DEFAULT_EXCERPT_RETRANSLATE, DEFAULT_EXCERPT_RETRANSLATE_TEXT),
        (DEFAULT_REVERSE_KEYWORDS, DEFAULT_REVERSE_KEYWORDS_TEXT),
        (DEFAULT_IMPROVE_SEGMENTS, DEFAULT_IMPROVE_SEGMENTS_TEXT),
        (DEFAULT_IMPROVE_ALL, DEFAULT_IMPROVE_ALL_TEXT),
    ]
}

pub const DEFAULT_SYSTEM_TEXT: &str =
    "你是资深的技术文档译者，负责把英文技术文档翻译成准确、通顺的简体中文。";

pub const DEFAULT_TRANSLATE_TEXT: &str = r#"将下面的英文技术文档片段翻译成简体中文。

规则：
- 完整翻译，不要省略、不要总结。
- 保留所有 Markdown/reStructuredText 标记、链接、URL 和行内代码。
- 代码、命令、文件名、API 名称保持原样。
- 专有名词首次出现可在括号中保留英文。
- 只输出译文，不要添加任何解释。

原文：
{{text}}"#;

pub const DEFAULT_SUMMARIZE_ORIGINAL_TEXT: &str = r#"请为下面的英文文档写一份详细的中文摘要。

要求：
1. 覆盖主要观点、关键信息和文档结构。
2. 保持原文的顺序和层次。
3. 摘要长度约为原文的两到三成。
4. 不遗漏重要概念和细节。

文档：
{{text}}

中文摘要："#;

pub const DEFAULT_SUMMARIZE_TRANSLATED_TEXT: &str = r#"请为下面的中文译文写一份详细的摘要。

要求：
1. 覆盖主要观点、关键信息和文档结构。
2. 保持译文的顺序和层次。
3. 摘要长度约为译文的两到三成。
4. 不遗漏重要概念和细节。

译文：
{{text}}

摘要："#;

pub const DEFAULT_COMPARE_TEXT: &str = r#"你是翻译质量审校。比较原文摘要与译文摘要，找出译文可能遗漏的内容。

原文摘要：
{{original_summary}}

译文摘要：
{{translated_summary}}

严格按下面的格式输出三行：
- 完整性评分：[0-10 的整数，10 表示完全一致]
- 遗漏内容：[列出遗漏的具体内容；没有遗漏则写"无"]
- 建议：[改进翻译的具体建议]"#;

pub const DEFAULT_FOCUSED_RETRANSLATE_TEXT: &str = r#"下面是英文文档中的若干片段，上一轮译文遗漏了部分内容。请重新翻译这些片段，补全遗漏，保持结构和标记不变。

遗漏内容：
{{missing}}

每个片段以 [SEG-n] 开头。按相同顺序输出每个片段的译文，片段之间单独一行写 <<<END>>>，不要输出编号或解释。

{{segments}}"#;

pub const DEFAULT_EXCERPT_RETRANSLATE_TEXT: &str = r#"上一轮译文遗漏了部分内容。请重新完整翻译下面的英文原文节选，特别注意补全遗漏，保持结构和标记不变。

遗漏内容：
{{missing}}

原文节选：
{{text}}

只输出译文。"#;

pub const DEFAULT_REVERSE_KEYWORDS_TEXT: &str = r#"下面是一段中文描述，说明译文遗漏了哪些内容。请给出最可能在英文原文中出现的英文关键词或短语，用逗号分隔，最多十个，只输出关键词。

描述：
{{missing}}"#;

pub const DEFAULT_IMPROVE_SEGMENTS_TEXT: &str = r#"下面每个片段给出英文原文和当前译文。请根据审校意见改进译文，补全遗漏，保持标记和结构不变。

遗漏内容：
{{missing}}

建议：
{{suggestions}}

按相同顺序输出每个片段改进后的译文，只输出译文本身，片段之间单独一行写 <<<END>>>。

{{segments}}"#;

pub const DEFAULT_IMPROVE_ALL_TEXT: &str = r#"下面是整篇文档的英文原文和当前译文，段落一一对应。请根据审校意见改进译文，补全遗漏，保持段落数量和顺序不变，段落之间用空行分隔。

遗漏内容：
{{missing}}

建议：
{{suggestions}}

原文：
{{original}}

当前译文：
{{current}}

只输出改进后的完整译文。"#;
