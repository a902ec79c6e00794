use crate::mode::{Mode, Style};

const OUTPUT_SHAPE: &str = "输出必须是有效的 JSON 对象，且只包含以下字段：\
{\"translatedText\": string, \"terms\": [{\"original\": string, \"translation\": string, \"definition\": string}], \"contextNote\": string}。\
terms 中的 definition 与 contextNote 请使用中文。";

fn style_instruction(style: Style) -> &'static str {
    match style {
        Style::Academic => "保持极高的学术严谨性。忠实保留特定哲学家的术语细微差别（如海德格尔的 Dasein，康德的 Transcendental），使用标准的学术中文表达。",
        Style::Literal => "采用直译策略。最大程度保留原文的句法结构和语序，即使这可能导致中文略显生硬，目的是为了进行语文学（Philological）研究。",
        Style::Liberal => "采用意译策略。在不改变原意的前提下，优化句子结构，使其更符合中文母语者的阅读习惯，流畅自然，通俗易懂。",
    }
}

/// Build the system instruction for a mode. `style` is ignored unless the
/// mode is a translation.
pub fn build_instruction(mode: Mode, style: Style) -> String {
    let mut instruction = String::new();

    match mode {
        Mode::Translation => {
            instruction.push_str("你是一位专业的哲学翻译家和导师。你的任务是翻译哲学文本（从英语/德语/法语/希腊语翻译成中文，或者从中文翻译成英文）。\n");
            instruction.push_str("1. **翻译策略**：");
            instruction.push_str(style_instruction(style));
            instruction.push('\n');
            instruction.push_str("2. **术语解析**：识别文本中使用的关键哲学概念/术语，并提供解释。\n");
            instruction.push_str("3. **语境说明**：提供简短的“背景与语境”说明，解释历史背景、具体的论点，或该文本所属的哲学传统。\n");
        }
        Mode::Note => {
            instruction.push_str("你是一位学术助手。你的任务是将用户的语音笔记或草稿整理成结构清晰的学术笔记。\n");
            instruction.push_str("1. **整理文本**：纠正口语错误，将内容重组为逻辑通顺的书面语。\n");
            instruction.push_str("2. **关键词提取**：提取笔记中的核心概念、人名或著作作为“术语”。\n");
            instruction.push_str("3. **摘要总结**：用一段话概括这篇笔记的核心思想作为“语境说明”。\n");
        }
        Mode::Meeting => {
            instruction.push_str("你是一位会议记录专员。你的任务是整理会议或对话录音文本。\n");
            instruction.push_str("1. **纪要整理**：将对话整理为清晰的记录，保留核心观点。\n");
            instruction.push_str("2. **重点标记**：提取会议中的关键决策、行动项或专有名词作为“术语”。\n");
            instruction.push_str("3. **会议概览**：总结会议的主题和背景作为“语境说明”。\n");
        }
        Mode::Polish => {
            instruction.push_str("你是一位专业的文字编辑。你的任务是润色用户的灵感记录。\n");
            instruction.push_str("1. **润色文本**：提升文采，使用更优美的表达，但保持原意。\n");
            instruction.push_str("2. **修辞分析**：提取文本中使用的关键意象或关键词作为“术语”。\n");
            instruction.push_str("3. **意图说明**：分析这段文字表达的情感或思想倾向作为“语境说明”。\n");
        }
    }

    instruction.push_str(OUTPUT_SHAPE);
    instruction
}
