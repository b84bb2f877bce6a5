//! Built-in content tools
//!
//! Prompts use `{field}` placeholders matching each tool's declared fields.

use super::{FieldKind, InputField, ToolDefinition};

const CONTENT_WRITER_SYSTEM: &str = "You are an experienced technical content writer. \
Write clear, practical, well-structured material for software developers. \
Respond in Markdown. Do not add a preamble or explain what you are about to do.";

const BLOG_POST_OUTLINE_TEMPLATE: &str = r#"Create a detailed outline for a blog post.

Topic: {topic}
Target audience: {audience}
Tone: {tone}

Include a working title, an introduction hook, 4-7 section headings with 2-3 bullet points each, and a short conclusion with a call to action."#;

const YOUTUBE_TITLES_SYSTEM: &str = "You write titles for educational programming videos on YouTube. \
Titles are specific, honest and curiosity-driven, never clickbait. \
Return a numbered list only.";

const YOUTUBE_TITLES_TEMPLATE: &str = r#"Suggest 10 titles for a video.

What the video covers:
{summary}

Primary keyword: {keyword}

Keep each title under 70 characters."#;

const COURSE_DESCRIPTION_TEMPLATE: &str = r#"Write a sales page description for an online course.

Course title: {title}
Skill level: {level}
What students will build or learn:
{outcomes}

Structure it as: a one-paragraph overview, a "What you'll learn" bullet list, a "Who this course is for" section, and a "Prerequisites" section."#;

const NEWSLETTER_SYSTEM: &str = "You write the opening section of a weekly developer newsletter. \
The voice is warm, direct and a little playful. Keep it under 200 words.";

const NEWSLETTER_INTRO_TEMPLATE: &str = r#"Write this week's newsletter intro.

Headline items this week:
{highlights}

Personal note from the author (optional, weave in if present): {note}"#;

const SOCIAL_THREAD_SYSTEM: &str = "You turn technical content into social media threads. \
Each post must stand on its own, stay under 280 characters, and avoid hashtags unless asked.";

const SOCIAL_THREAD_TEMPLATE: &str = r#"Turn the following content into a thread for {platform}.

Content:
{content}

Number each post. Open with a hook and end with a link placeholder [LINK]."#;

fn field(name: &str, label: &str, kind: FieldKind, required: bool) -> InputField {
    InputField {
        name: name.to_string(),
        label: label.to_string(),
        kind,
        required,
        placeholder: None,
        options: Vec::new(),
    }
}

fn select(name: &str, label: &str, required: bool, options: &[&str]) -> InputField {
    InputField {
        options: options.iter().map(|o| o.to_string()).collect(),
        ..field(name, label, FieldKind::Select, required)
    }
}

fn with_placeholder(mut field: InputField, placeholder: &str) -> InputField {
    field.placeholder = Some(placeholder.to_string());
    field
}

pub(super) fn tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            slug: "blog-post-outline".to_string(),
            name: "Blog Post Outline".to_string(),
            description: "Turn a topic into a structured blog post outline".to_string(),
            system_prompt: CONTENT_WRITER_SYSTEM.to_string(),
            template: BLOG_POST_OUTLINE_TEMPLATE.to_string(),
            fields: vec![
                with_placeholder(
                    field("topic", "Topic", FieldKind::Text, true),
                    "Error handling in async Rust",
                ),
                with_placeholder(
                    field("audience", "Target Audience", FieldKind::Text, false),
                    "Intermediate backend developers",
                ),
                select(
                    "tone",
                    "Tone",
                    false,
                    &["casual", "professional", "academic", "humorous"],
                ),
            ],
        },
        ToolDefinition {
            slug: "youtube-title-ideas".to_string(),
            name: "YouTube Title Ideas".to_string(),
            description: "Brainstorm titles for a programming video".to_string(),
            system_prompt: YOUTUBE_TITLES_SYSTEM.to_string(),
            template: YOUTUBE_TITLES_TEMPLATE.to_string(),
            fields: vec![
                field("summary", "Video Summary", FieldKind::Textarea, true),
                field("keyword", "Primary Keyword", FieldKind::Text, false),
            ],
        },
        ToolDefinition {
            slug: "course-description".to_string(),
            name: "Course Description".to_string(),
            description: "Draft a course landing page description".to_string(),
            system_prompt: CONTENT_WRITER_SYSTEM.to_string(),
            template: COURSE_DESCRIPTION_TEMPLATE.to_string(),
            fields: vec![
                field("title", "Course Title", FieldKind::Text, true),
                select(
                    "level",
                    "Skill Level",
                    true,
                    &["beginner", "intermediate", "advanced"],
                ),
                field("outcomes", "Learning Outcomes", FieldKind::Textarea, true),
            ],
        },
        ToolDefinition {
            slug: "newsletter-intro".to_string(),
            name: "Newsletter Intro".to_string(),
            description: "Write the opening of a weekly newsletter".to_string(),
            system_prompt: NEWSLETTER_SYSTEM.to_string(),
            template: NEWSLETTER_INTRO_TEMPLATE.to_string(),
            fields: vec![
                field("highlights", "This Week's Highlights", FieldKind::Textarea, true),
                field("note", "Personal Note", FieldKind::Textarea, false),
            ],
        },
        ToolDefinition {
            slug: "social-thread".to_string(),
            name: "Social Thread".to_string(),
            description: "Repurpose an article into a social media thread".to_string(),
            system_prompt: SOCIAL_THREAD_SYSTEM.to_string(),
            template: SOCIAL_THREAD_TEMPLATE.to_string(),
            fields: vec![
                select("platform", "Platform", true, &["X", "Bluesky", "Mastodon", "LinkedIn"]),
                field("content", "Source Content", FieldKind::Textarea, true),
            ],
        },
    ]
}
