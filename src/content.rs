use std::collections::BTreeMap;

use serde::Deserialize;

/// The structured portfolio record graph supplied by the content source.
///
/// Mirrors the site's content file: projects, work experience, education,
/// and an about/profile section. Unknown fields (thumbnails, URLs, metric
/// maps) are ignored on deserialization.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentData {
    #[serde(default)]
    pub apps: Vec<Project>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub about: Option<About>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub tech: Vec<String>,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub date_range: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub problem: Option<String>,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub my_contribution: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub learned: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub id: String,
    pub company: String,
    pub role: String,
    #[serde(default)]
    pub period: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub stack: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Education {
    pub id: String,
    pub institution: String,
    pub program: String,
    #[serde(default)]
    pub degree_level: String,
    #[serde(default)]
    pub period: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub courses: Vec<String>,
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default)]
    pub honors: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct About {
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub bio: String,
    /// Skill categories mapped to skill lists.
    #[serde(default)]
    pub skills: BTreeMap<String, Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_content_file_and_ignores_unknown_fields() {
        let raw = r#"{
            "apps": [{
                "id": "devcontext-workspace",
                "title": "DevContext",
                "shortDescription": "Unified developer workspace.",
                "tech": ["React", "TypeScript"],
                "role": "Full-Stack Developer",
                "dateRange": "2024",
                "thumbnail": "/images/apps/devcontext.svg",
                "status": "Live",
                "featured": true,
                "tags": ["AI", "Productivity"],
                "problem": "Tool fragmentation.",
                "solution": "One dashboard.",
                "myContribution": "Built it end to end.",
                "features": ["Semantic search"],
                "metrics": { "searchSpeed": 200 },
                "learned": ["Vector similarity"]
            }],
            "experience": [{
                "id": "customstacks-ai-engineer",
                "company": "CustomStacks",
                "role": "AI Software Engineer",
                "period": "Mar 2025 - Present",
                "tags": ["AI"],
                "responsibilities": ["Shipped a multi-agent system."],
                "impact": { "enterpriseClientsServed": 12 },
                "stack": ["Python", "AWS"]
            }],
            "education": [{
                "id": "northeastern-ms-ai",
                "institution": "Northeastern University",
                "program": "Artificial Intelligence",
                "degreeLevel": "M.S.",
                "period": "Sep 2022 - Dec 2024",
                "courses": ["Deep Learning"]
            }],
            "about": {
                "headline": "Building intelligent systems",
                "bio": "AI engineer.",
                "photo": "/images/me.svg",
                "skills": { "Languages": ["Python", "Rust"] }
            }
        }"#;

        let data: ContentData = serde_json::from_str(raw).expect("valid content JSON");
        assert_eq!(data.apps.len(), 1);
        assert_eq!(data.apps[0].id, "devcontext-workspace");
        assert_eq!(data.apps[0].tags, vec!["AI", "Productivity"]);
        assert_eq!(data.experience[0].company, "CustomStacks");
        assert_eq!(data.education[0].degree_level, "M.S.");
        let about = data.about.expect("about section");
        assert_eq!(about.skills["Languages"], vec!["Python", "Rust"]);
    }
}
