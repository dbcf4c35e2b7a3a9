// Rutgers CS B.S. requirements (120 credits)

use super::{
    Catalog, CategoryKind, Course, Difficulty, ExclusiveGroup, RequirementCategory, Sequence,
    Subcategory,
};
use Difficulty::{Easy, Hard, Medium};

fn course(code: &str, name: &str, credits: u32, difficulty: Difficulty, prereqs: &[&str]) -> Course {
    let mut course = Course::new(code, name, credits);
    course.difficulty = Some(difficulty);
    course.prereqs = prereqs.iter().map(|p| p.to_string()).collect();
    course
}

fn flat(key: &str, name: &str, credits: u32, description: &str, courses: Vec<Course>) -> RequirementCategory {
    RequirementCategory {
        key: key.to_string(),
        name: name.to_string(),
        credits,
        description: description.to_string(),
        kind: CategoryKind::Flat { courses },
        subcategories: Vec::new(),
    }
}

fn generic(key: &str, name: &str, credits: u32, description: &str) -> RequirementCategory {
    RequirementCategory {
        key: key.to_string(),
        name: name.to_string(),
        credits,
        description: description.to_string(),
        kind: CategoryKind::Generic,
        subcategories: Vec::new(),
    }
}

fn sequence(name: &str, total_credits: u32, courses: Vec<Course>) -> Sequence {
    let codes: Vec<&str> = courses.iter().map(|c| c.code.as_str()).collect();
    Sequence {
        name: name.to_string(),
        description: format!("{} courses from {{{}}}", courses.len(), codes.join(", ")),
        required_courses: courses.len(),
        total_credits,
        courses,
    }
}

pub fn catalog() -> Catalog {
    Catalog {
        name: "Rutgers Computer Science B.S.".to_string(),
        total_credits: 120,
        categories: vec![
            flat(
                "computerScience",
                "Computer Science Core",
                20,
                "Core CS courses required for the major",
                vec![
                    course("01:198:111", "Introduction to Computer Science", 4, Medium, &[]),
                    course("01:198:112", "Data Structures", 4, Medium, &["01:198:111"]),
                    course("01:198:205", "Introduction to Discrete Structures I", 4, Hard, &["01:198:111"]),
                    course("01:198:211", "Computer Architecture", 4, Medium, &["01:198:111"]),
                    course("01:198:344", "Design and Analysis of Computer Algorithms", 4, Hard, &["01:198:112", "01:198:205"]),
                ],
            ),
            flat(
                "csAdditional",
                "CS Additional Requirement",
                3,
                "1 course from the following options (3-4 credits depending on choice)",
                vec![
                    course("01:198:206", "Introduction to Discrete Structures II", 4, Hard, &["01:198:205"]),
                    course("01:640:477", "Mathematical Theory of Probability", 4, Hard, &["01:640:152"]),
                    course("14:332:226", "Probability and Random Processes", 3, Hard, &[]),
                ],
            ),
            flat(
                "mathematics",
                "Mathematics Requirements",
                11,
                "Mathematics foundation courses required for CS major",
                vec![
                    course("01:640:151", "Calculus I for Mathematical and Physical Sciences", 4, Medium, &[]),
                    course("01:640:152", "Calculus II for Mathematical and Physical Sciences", 4, Medium, &["01:640:151"]),
                    course("01:640:250", "Introductory Linear Algebra", 3, Medium, &["01:640:151"]),
                ],
            ),
            physics(),
            contemporary_challenges(),
            generic(
                "naturalSciences",
                "Natural Sciences [NS]",
                8,
                "2 courses from physical or biological sciences (excluding Physics/Chemistry which are in major requirements)",
            ),
            generic(
                "socialHistorical",
                "Social & Historical Analysis [SCL/HST]",
                6,
                "1 course from each: Historical Analysis + Social Analysis",
            ),
            generic(
                "artsHumanities",
                "Arts & Humanities [AH]",
                6,
                "2 courses from different categories: Human Experience, Arts/Literatures, Nature of Languages, or Critical Creative Expression",
            ),
            generic(
                "writingCommunication",
                "Writing & Communication [WC]",
                9,
                "3 courses: College Writing + Revision-Based + Discipline-Based",
            ),
            generic(
                "quantitativeReasoning",
                "Quantitative & Formal Reasoning [QQ/QR]",
                8,
                "2 courses: Quantitative Information + Mathematical Reasoning",
            ),
            electives(),
        ],
        exclusive_groups: vec![ExclusiveGroup {
            category: "csAdditional".to_string(),
            codes: vec![
                "01:198:206".to_string(),
                "01:640:477".to_string(),
                "14:332:226".to_string(),
            ],
        }],
    }
}

fn physics() -> RequirementCategory {
    RequirementCategory {
        key: "physics".to_string(),
        name: "Physics or Chemistry".to_string(),
        credits: 8,
        description: "Choose one sequence from the options below. Most students take the Physics for the Sciences sequence (01:750:193 + 01:750:194).".to_string(),
        kind: CategoryKind::Sequenced {
            sequences: vec![
                sequence(
                    "Physics for the Sciences",
                    5,
                    vec![
                        course("01:750:193", "Physics for the Sciences", 4, Medium, &[]),
                        course("01:750:194", "Physics for the Sciences Laboratory", 1, Easy, &["01:750:193"]),
                    ],
                ),
                sequence(
                    "Honors Physics",
                    10,
                    vec![
                        course("01:750:271", "Honors Physics I", 3, Hard, &[]),
                        course("01:750:272", "Honors Physics II", 3, Hard, &["01:750:271"]),
                        course("01:750:275", "Honors Physics Laboratory I", 2, Medium, &["01:750:271"]),
                        course("01:750:276", "Honors Physics Laboratory II", 2, Medium, &["01:750:272"]),
                    ],
                ),
                sequence(
                    "General Physics",
                    8,
                    vec![
                        course("01:750:203", "General Physics I", 3, Medium, &[]),
                        course("01:750:204", "General Physics II", 3, Medium, &["01:750:203"]),
                        course("01:750:205", "General Physics Laboratory I", 1, Easy, &["01:750:203"]),
                        course("01:750:206", "General Physics Laboratory II", 1, Easy, &["01:750:204"]),
                    ],
                ),
                sequence(
                    "Analytical Physics",
                    8,
                    vec![
                        course("01:750:123", "Analytical Physics I", 2, Medium, &[]),
                        course("01:750:124", "Analytical Physics II", 2, Medium, &["01:750:123"]),
                        course("01:750:227", "Analytical Physics III", 3, Medium, &["01:750:124"]),
                        course("01:750:229", "Analytical Physics Laboratory", 1, Easy, &["01:750:227"]),
                    ],
                ),
                sequence(
                    "Chemistry for Engineers",
                    7,
                    vec![
                        course("01:160:159", "General Chemistry for Engineers", 3, Medium, &[]),
                        course("01:160:160", "General Chemistry for Engineers", 3, Medium, &["01:160:159"]),
                        course("01:160:171", "General Chemistry Laboratory", 1, Easy, &["01:160:159"]),
                    ],
                ),
                sequence(
                    "General Chemistry",
                    9,
                    vec![
                        course("01:160:161", "General Chemistry", 4, Medium, &[]),
                        course("01:160:162", "General Chemistry", 4, Medium, &["01:160:161"]),
                        course("01:160:171", "General Chemistry Laboratory", 1, Easy, &["01:160:161"]),
                    ],
                ),
            ],
        },
        subcategories: Vec::new(),
    }
}

fn contemporary_challenges() -> RequirementCategory {
    let mut common_future = course("01:198:142", "Contemporary Challenges: Our Common Future", 4, Medium, &[]);
    common_future.category = Some("CC-O".to_string());
    let mut diversity = course("01:013:308", "Contemporary Challenges: Diversity and Social Inequalities", 3, Medium, &[]);
    diversity.category = Some("CC-D".to_string());

    let mut category = flat(
        "contemporaryChallenges",
        "Contemporary Challenges [CC]",
        7,
        "2 courses: 1 from Our Common Future + 1 from Diversities and Social Inequalities",
        vec![common_future, diversity],
    );
    category.subcategories = vec![
        Subcategory {
            name: "Our Common Future [CC-O]".to_string(),
            credits: 4,
            description: "Contemporary global issues and technology".to_string(),
        },
        Subcategory {
            name: "Diversities and Social Inequalities [CC-D]".to_string(),
            credits: 3,
            description: "Social justice and power systems".to_string(),
        },
    ];
    category
}

fn electives() -> RequirementCategory {
    // (code, name, difficulty, prereq)
    let listed: [(&str, &str, Difficulty, Option<&str>); 31] = [
        ("01:198:210", "Data Management for Data Science", Medium, Some("01:198:112")),
        ("01:198:213", "Software Methodology", Medium, Some("01:198:112")),
        ("01:198:214", "Systems Programming", Hard, Some("01:198:112")),
        ("01:198:314", "Principles of Programming Languages", Hard, Some("01:198:112")),
        ("01:198:323", "Numerical Analysis and Computing", Hard, Some("01:640:152")),
        ("01:198:324", "Numerical Methods", Hard, Some("01:640:152")),
        ("01:198:334", "Introduction to Imaging and Multimedia", Medium, Some("01:198:112")),
        ("01:198:336", "Principles of Information and Data Management", Medium, Some("01:198:112")),
        ("01:198:352", "Internet Technology", Medium, Some("01:198:112")),
        ("01:198:411", "Computer Architecture II", Hard, Some("01:198:211")),
        ("01:198:415", "Compilers", Hard, Some("01:198:314")),
        ("01:198:416", "Operating Systems Design", Hard, Some("01:198:214")),
        ("01:198:417", "Distributed Systems: Concepts and Design", Hard, Some("01:198:416")),
        ("01:198:419", "Computer Security", Hard, Some("01:198:112")),
        ("01:198:424", "Modeling and Simulation of Continuous Systems", Hard, Some("01:640:152")),
        ("01:198:425", "Brain-Inspired Computing", Hard, Some("01:198:112")),
        ("01:198:428", "Introduction to Computer Graphics", Medium, Some("01:198:112")),
        ("01:198:431", "Software Engineering", Medium, Some("01:198:213")),
        ("01:198:437", "Database Systems Implementation", Hard, Some("01:198:336")),
        ("01:198:439", "Introduction to Data Science", Medium, Some("01:198:112")),
        ("01:198:440", "Introduction to Artificial Intelligence", Hard, Some("01:198:112")),
        ("01:198:442", "Topics in Computer Science", Medium, Some("01:198:112")),
        ("01:198:443", "Topics in Computer Science", Medium, Some("01:198:112")),
        ("01:198:444", "Topics in Computer Science", Medium, Some("01:198:112")),
        ("01:198:445", "Topics in Computer Science", Medium, Some("01:198:112")),
        ("01:198:452", "Formal Languages and Automata", Hard, Some("01:198:206")),
        ("01:198:460", "Introduction to Computational Robotics", Hard, Some("01:198:112")),
        ("01:198:461", "Machine Learning Principles", Hard, Some("01:198:112")),
        ("01:198:462", "Introduction to Deep Learning", Hard, Some("01:198:461")),
        ("01:198:493", "Independent Study in Computer Science", Medium, None),
        ("01:198:494", "Independent Study in Computer Science", Medium, None),
    ];

    let courses = listed
        .iter()
        .map(|(code, name, difficulty, prereq)| {
            let prereqs: Vec<&str> = prereq.iter().copied().collect();
            course(code, name, 4, *difficulty, &prereqs)
        })
        .collect();

    flat(
        "electives",
        "Computer Science Electives",
        28,
        "A CS Advisor will help you make selections from this list to complete your CS major. Many electives are offered only once per year.",
        courses,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_shapes() {
        let catalog = catalog();
        let physics = catalog.category("physics").unwrap();

        let CategoryKind::Sequenced { sequences } = &physics.kind else {
            panic!("physics should be sequenced");
        };

        assert_eq!(sequences.len(), 6);
        assert_eq!(sequences[0].required_courses, 2);
        assert_eq!(sequences[0].total_credits, 5);
        assert_eq!(sequences[0].description, "2 courses from {01:750:193, 01:750:194}");
        assert_eq!(sequences[1].required_courses, 4);
    }

    #[test]
    fn test_electives_listed() {
        let catalog = catalog();
        let electives = catalog.category("electives").unwrap();

        assert_eq!(electives.courses().count(), 31);
        assert!(electives.courses().all(|c| c.credits == 4));
        assert!(electives.find_course("01:198:493").unwrap().prereqs.is_empty());
    }
}
