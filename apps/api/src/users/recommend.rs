use crate::models::job::JobCategory;

/// Maps a free-text skill onto the job category it usually leads to.
fn category_for_skill(skill: &str) -> Option<JobCategory> {
    let category = match skill.trim().to_lowercase().as_str() {
        "javascript" | "python" | "react" | "node" | "programming" => JobCategory::Technology,
        "design" | "photoshop" | "marketing" => JobCategory::Marketing,
        "sales" => JobCategory::Sales,
        "customer service" => JobCategory::CustomerService,
        "teaching" => JobCategory::Education,
        "tutoring" => JobCategory::Tutoring,
        "cooking" | "food" => JobCategory::FoodService,
        _ => return None,
    };
    Some(category)
}

/// Distinct categories suggested by a student's skills, in skill order.
pub fn categories_for_skills(skills: &[String]) -> Vec<JobCategory> {
    let mut categories = Vec::new();
    for category in skills.iter().filter_map(|s| category_for_skill(s)) {
        if !categories.contains(&category) {
            categories.push(category);
        }
    }
    categories
}

/// Skills normalised for matching against job tags.
pub fn skill_tags(skills: &[String]) -> Vec<String> {
    skills
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skills(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_categories_are_mapped_and_deduplicated() {
        let found = categories_for_skills(&skills(&["Python", "react", "Cooking", "juggling", "food"]));
        assert_eq!(found, vec![JobCategory::Technology, JobCategory::FoodService]);
    }

    #[test]
    fn test_multi_word_skill() {
        assert_eq!(
            categories_for_skills(&skills(&[" Customer Service "])),
            vec![JobCategory::CustomerService]
        );
    }

    #[test]
    fn test_skill_tags_lowercase_and_drop_blanks() {
        assert_eq!(skill_tags(&skills(&["Excel", "  ", "SQL "])), skills(&["excel", "sql"]));
    }
}
