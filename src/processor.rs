use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use log::{info, warn};

use crate::content::{About, ContentData, Education, Experience, Project};
use crate::document::{Document, SourceType};

/// Turns heterogeneous source content into normalized [`Document`]s:
/// structured in-memory records on one side, loose files on the other.
#[derive(Debug, Default)]
pub struct DocumentProcessor;

impl DocumentProcessor {
    pub fn new() -> Self {
        DocumentProcessor
    }

    /// Walk the structured record graph and emit one document per logical
    /// sub-record: each project, each experience entry, each education
    /// entry, plus one for the about section.
    pub fn process_structured_data(
        &self,
        content: &ContentData,
        source_label: &str,
    ) -> Vec<Document> {
        let mut documents = Vec::new();

        for project in &content.apps {
            documents.push(project_document(project));
        }
        for experience in &content.experience {
            documents.push(experience_document(experience));
        }
        for education in &content.education {
            documents.push(education_document(education));
        }
        if let Some(about) = &content.about {
            documents.push(about_document(about));
        }

        info!(
            "Processed {} documents from {} content",
            documents.len(),
            source_label
        );
        documents
    }

    /// Emit one document per regular file directly under `path`.
    ///
    /// A file that cannot be read or has an unsupported format is logged
    /// and skipped; a single corrupt file never blocks the rest of the
    /// batch. Failing to enumerate the directory itself is an error.
    pub fn process_directory<P: AsRef<Path>>(&self, path: P) -> io::Result<Vec<Document>> {
        let path = path.as_ref();
        let mut documents = Vec::new();

        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let file_path = entry.path();
            if !file_path.is_file() {
                continue;
            }

            match Document::from_file(&file_path) {
                Ok(doc) if doc.raw_text.trim().is_empty() => {
                    warn!("Skipping {}: no extractable text", file_path.display());
                }
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    warn!("Skipping {}: {:#}", file_path.display(), e);
                }
            }
        }

        info!(
            "Processed {} documents from {}",
            documents.len(),
            path.display()
        );
        Ok(documents)
    }
}

fn project_document(project: &Project) -> Document {
    let mut parts = vec![format!("Project: {}", project.title)];
    push_field(&mut parts, "Role", &project.role);
    push_field(&mut parts, "Timeline", &project.date_range);
    push_field(&mut parts, "Status", &project.status);
    push_field(&mut parts, "Summary", &project.short_description);
    if let Some(problem) = &project.problem {
        push_field(&mut parts, "Problem", problem);
    }
    if let Some(solution) = &project.solution {
        push_field(&mut parts, "Solution", solution);
    }
    if let Some(contribution) = &project.my_contribution {
        push_field(&mut parts, "Contribution", contribution);
    }
    push_list(&mut parts, "Key features", &project.features);
    push_joined(&mut parts, "Technologies", &project.tech);
    push_joined(&mut parts, "Learned", &project.learned);

    website_document("project", &project.id, project.title.clone(), parts, &project.tags)
}

fn experience_document(experience: &Experience) -> Document {
    let title = format!("{} at {}", experience.role, experience.company);
    let mut parts = vec![format!("Experience: {}", title)];
    push_field(&mut parts, "Period", &experience.period);
    push_list(&mut parts, "Responsibilities", &experience.responsibilities);
    push_joined(&mut parts, "Stack", &experience.stack);

    website_document("experience", &experience.id, title, parts, &experience.tags)
}

fn education_document(education: &Education) -> Document {
    let title = format!(
        "{} {} at {}",
        education.degree_level, education.program, education.institution
    );
    let mut parts = vec![format!("Education: {}", title.trim())];
    push_field(&mut parts, "Period", &education.period);
    push_joined(&mut parts, "Courses", &education.courses);
    push_joined(&mut parts, "Projects", &education.projects);
    push_joined(&mut parts, "Honors", &education.honors);

    website_document(
        "education",
        &education.id,
        title.trim().to_string(),
        parts,
        &education.tags,
    )
}

fn about_document(about: &About) -> Document {
    let mut parts = vec![format!("About: {}", about.headline)];
    push_field(&mut parts, "Bio", &about.bio);
    for (category, skills) in &about.skills {
        push_joined(&mut parts, category, skills);
    }

    website_document("about", "profile", about.headline.clone(), parts, &[])
}

fn website_document(
    kind: &str,
    record_id: &str,
    title: String,
    parts: Vec<String>,
    tags: &[String],
) -> Document {
    Document {
        id: format!("{}-{}", kind, record_id),
        source_type: SourceType::Website,
        source_id: record_id.to_string(),
        title,
        raw_text: parts.join("\n"),
        tags: tags.iter().cloned().collect::<BTreeSet<_>>(),
    }
}

fn push_field(parts: &mut Vec<String>, label: &str, value: &str) {
    if !value.trim().is_empty() {
        parts.push(format!("{}: {}", label, value.trim()));
    }
}

fn push_list(parts: &mut Vec<String>, label: &str, items: &[String]) {
    if !items.is_empty() {
        let mut section = format!("{}:", label);
        for item in items {
            section.push_str("\n- ");
            section.push_str(item);
        }
        parts.push(section);
    }
}

fn push_joined(parts: &mut Vec<String>, label: &str, items: &[String]) {
    if !items.is_empty() {
        parts.push(format!("{}: {}", label, items.join(", ")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentData;
    use std::path::PathBuf;

    fn sample_content() -> ContentData {
        serde_json::from_str(
            r#"{
                "apps": [{
                    "id": "devcontext-workspace",
                    "title": "DevContext",
                    "shortDescription": "Unified developer workspace.",
                    "tech": ["React", "TypeScript"],
                    "tags": ["AI", "Productivity"],
                    "features": ["Semantic search", "Command palette"]
                }],
                "experience": [{
                    "id": "customstacks-ai-engineer",
                    "company": "CustomStacks",
                    "role": "AI Software Engineer",
                    "period": "Mar 2025 - Present",
                    "tags": ["AI"],
                    "responsibilities": ["Shipped a multi-agent AI system."],
                    "stack": ["Python", "AWS"]
                }],
                "education": [{
                    "id": "northeastern-ms-ai",
                    "institution": "Northeastern University",
                    "program": "Artificial Intelligence",
                    "degreeLevel": "M.S.",
                    "courses": ["Deep Learning", "NLP"]
                }],
                "about": {
                    "headline": "Building intelligent systems",
                    "bio": "AI engineer.",
                    "skills": { "Languages": ["Python", "Rust"] }
                }
            }"#,
        )
        .expect("valid sample content")
    }

    #[test]
    fn emits_one_document_per_sub_record() {
        let processor = DocumentProcessor::new();
        let docs = processor.process_structured_data(&sample_content(), "website");

        assert_eq!(docs.len(), 4);
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert!(ids.contains(&"project-devcontext-workspace"));
        assert!(ids.contains(&"experience-customstacks-ai-engineer"));
        assert!(ids.contains(&"education-northeastern-ms-ai"));
        assert!(ids.contains(&"about-profile"));
        assert!(docs.iter().all(|d| d.source_type == SourceType::Website));
    }

    #[test]
    fn experience_document_carries_company_and_responsibilities() {
        let processor = DocumentProcessor::new();
        let docs = processor.process_structured_data(&sample_content(), "website");

        let exp = docs
            .iter()
            .find(|d| d.source_id == "customstacks-ai-engineer")
            .expect("experience document");
        assert!(exp.raw_text.contains("CustomStacks"));
        assert!(exp.raw_text.contains("multi-agent AI system"));
        assert!(exp.raw_text.contains("Stack: Python, AWS"));
        assert!(exp.tags.contains("AI"));
    }

    #[test]
    fn project_tags_are_copied() {
        let processor = DocumentProcessor::new();
        let docs = processor.process_structured_data(&sample_content(), "website");

        let project = docs
            .iter()
            .find(|d| d.source_id == "devcontext-workspace")
            .expect("project document");
        assert!(project.tags.contains("AI"));
        assert!(project.tags.contains("Productivity"));
        assert!(project.raw_text.contains("- Semantic search"));
    }

    #[test]
    fn directory_processing_skips_unreadable_files() {
        let dir = temp_dir("processor-skip");
        fs::write(dir.join("bio.txt"), "A short biography.").unwrap();
        fs::write(dir.join("blob.bin"), [0u8, 159, 146, 150]).unwrap();

        let processor = DocumentProcessor::new();
        let docs = processor.process_directory(&dir).expect("directory readable");

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source_id, "bio.txt");
        assert_eq!(docs[0].source_type, SourceType::File);
        assert_eq!(docs[0].raw_text, "A short biography.");

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_directory_is_an_error() {
        let processor = DocumentProcessor::new();
        let missing = std::env::temp_dir().join("portfolio-rag-does-not-exist");
        assert!(processor.process_directory(&missing).is_err());
    }

    fn temp_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "portfolio-rag-{}-{}",
            label,
            std::process::id()
        ));
        fs::remove_dir_all(&dir).ok();
        fs::create_dir_all(&dir).unwrap();
        dir
    }
}
