//! Embedded HTML for the landing page and the prediction form

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Student Performance Predictor</title>
</head>
<body>
    <h1>Student Performance Predictor</h1>
    <p>Estimate a student's math score from their background and their reading and writing scores.</p>
    <a href="/predictdata">Go to the prediction form</a>
</body>
</html>
"#;

const FORM_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Predict Math Score</title>
    <style>
        body{font-family:sans-serif;max-width:32rem;margin:2rem auto}
        label{display:block;margin-top:.75rem}
        select,input{width:100%;padding:.3rem}
        .result{margin-top:1.5rem;font-weight:bold}
    </style>
</head>
<body>
    <h1>Student Exam Performance Indicator</h1>
    <form action="/predictdata" method="post">
"#;

const FORM_TAIL: &str = r#"        <label>Reading Score out of 100
            <input type="number" name="reading_score" min="0" max="100" placeholder="Enter your reading score">
        </label>
        <label>Writing Score out of 100
            <input type="number" name="writing_score" min="0" max="100" placeholder="Enter your writing score">
        </label>
        <p><input type="submit" value="Predict your Maths Score"></p>
    </form>
"#;

/// Select fields of the form: (field name, label, options)
const SELECTS: &[(&str, &str, &[&str])] = &[
    ("gender", "Gender", &["male", "female"]),
    (
        "race_ethnicity",
        "Race or Ethnicity",
        &["group A", "group B", "group C", "group D", "group E"],
    ),
    (
        "parental_level_of_education",
        "Parental Level of Education",
        &[
            "associate's degree",
            "bachelor's degree",
            "high school",
            "master's degree",
            "some college",
            "some high school",
        ],
    ),
    ("lunch", "Lunch Type", &["free/reduced", "standard"]),
    ("test_preparation_course", "Test Preparation Course", &["none", "completed"]),
];

pub fn index() -> String {
    INDEX_HTML.to_string()
}

/// The prediction form, with `result` rendered below it when present
pub fn predict_form(result: Option<&str>) -> String {
    let mut html = String::with_capacity(FORM_HEAD.len() + FORM_TAIL.len() + 2048);
    html.push_str(FORM_HEAD);
    for (name, label, options) in SELECTS {
        html.push_str(&format!("        <label>{label}\n            <select name=\"{name}\">\n"));
        html.push_str(&format!(
            "                <option value=\"\" selected disabled>Select {}</option>\n",
            label.to_lowercase()
        ));
        for option in options.iter() {
            let value = escape_html(option);
            html.push_str(&format!("                <option value=\"{value}\">{value}</option>\n"));
        }
        html.push_str("            </select>\n        </label>\n");
    }
    html.push_str(FORM_TAIL);
    if let Some(result) = result {
        html.push_str(&format!(
            "    <h2 class=\"result\">THE prediction is {}</h2>\n",
            escape_html(result)
        ));
    }
    html.push_str("</body>\n</html>\n");
    html
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
