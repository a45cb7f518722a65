use crate::descriptor::DeploymentDescriptor;

/// Best-practice directives appended to every prompt, in order.  The model
/// sees this text verbatim, so any wording change alters generated output.
const DIRECTIVES: &str = "\n**Instructions & Best Practices to Follow:**\n\
- Use multi-stage builds. The first stage should build dependencies, and the final stage should be a lean image with only the production code and necessary dependencies.\n\
- Do not run as the `root` user. Create a non-root user (e.g., 'appuser') and switch to it.\n\
- Use a `.dockerignore` file (provide an example of what it should contain in a comment).\n\
- Leverage Docker layer caching by copying dependency files and installing packages before copying the rest of the source code.\n\
- Ensure all permissions are set correctly for the non-root user.\n\
- The final output should be only the raw Dockerfile content, without any explanations or markdown formatting like ```dockerfile.";

/// Build the instruction sent to the model for one deployment descriptor.
pub fn build_prompt(d: &DeploymentDescriptor) -> String {
    let mut prompt = format!(
        "Generate a secure, production-ready, multi-stage Dockerfile for a \
         **{}** application using **{}**.\n\n\
         **Application Details:**\n\
         - The dependency file is named `{}`.\n\
         - The application runs on and exposes port `{}`.\n\
         - The command to start the application is `{}`.\n",
        d.language(),
        d.package_manager(),
        d.dependency_file(),
        d.port(),
        d.start_command(),
    );

    if let Some(build) = d.build_command() {
        prompt.push_str(&format!("- The build command is `{build}`.\n"));
    }

    if let Some(image) = d.base_image() {
        prompt.push_str(&format!(
            "- The user has requested a base image of `{image}`. Use this if it is a valid \
             and secure choice, otherwise select a suitable slim or alpine official image.\n"
        ));
    }

    prompt.push_str(DIRECTIVES);
    prompt
}
