//! System prompt templates.

/// System prompt for answering one generated question of a control.
pub fn question_prompt(control_name: &str, context: &str, question: &str) -> String {
    format!(
        "You are an expert in security controls. Answer the QUESTION using the DOCUMENT TEXT \
         retrieved for the CONTROL NAME below.\n\
         Start with the company's name. State whether the DOCUMENT TEXT answers the QUESTION. \
         Do not add unnecessary explanations.\n\n\
         CONTROL NAME: {control_name}\n\
         DOCUMENT TEXT: {context}\n\
         QUESTION: {question}"
    )
}

/// System prompt for a free-text query with no control identifier.
pub fn generic_prompt(context: &str) -> String {
    format!(
        "You are a semantic search assistant. Respond to the user's query with relevant \
         information from the retrieved DOCUMENT TEXT.\n\
         Start with the company's name. State whether the query is answered in the DOCUMENT \
         TEXT. Do not add unnecessary explanations.\n\n\
         DOCUMENT TEXT: {context}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_prompt_carries_all_inputs() {
        let prompt = question_prompt(
            "Access Control",
            "FILE: a.pdf\nCONTENT: MFA is required.",
            "Is MFA enforced?",
        );
        assert!(prompt.starts_with("You are an expert in security controls."));
        assert!(prompt.contains("CONTROL NAME: Access Control\n"));
        assert!(prompt.contains("DOCUMENT TEXT: FILE: a.pdf\nCONTENT: MFA is required.\n"));
        assert!(prompt.ends_with("QUESTION: Is MFA enforced?"));
    }

    #[test]
    fn generic_prompt_ends_with_context() {
        let prompt = generic_prompt("FILE: b.pdf\nCONTENT: Least privilege means...");
        assert!(prompt.starts_with("You are a semantic search assistant."));
        assert!(prompt.ends_with("DOCUMENT TEXT: FILE: b.pdf\nCONTENT: Least privilege means..."));
    }
}
